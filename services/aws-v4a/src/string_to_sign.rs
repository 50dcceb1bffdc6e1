// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt::Write;

use sigv4a_core::hash::hex_sha256;
use sigv4a_core::time::{format_iso8601, DateTime};
use sigv4a_core::Result;

use crate::constants::{ALGORITHM, ALGORITHM_PAYLOAD, ALGORITHM_TRAILER};
use crate::Scope;

/// StringToSign for a request:
///
/// ```text
/// AWS4-ECDSA-P256-SHA256
/// 20150830T123600Z
/// 20150830/*/exampleservice/aws4_request
/// <hex sha256 of the canonical request>
/// ```
pub fn string_to_sign(time: DateTime, scope: &Scope, canonical_request: &str) -> Result<String> {
    let hashed = hex_sha256(canonical_request.as_bytes());
    build(ALGORITHM, time, scope, &[hashed.as_str()])
}

/// StringToSign for one chunk of a streamed body.
///
/// Chained from the signature of the previous chunk (or of the request
/// itself for the first chunk).
pub fn chunk_string_to_sign(
    time: DateTime,
    scope: &Scope,
    prev_signature: &str,
    chunk: &[u8],
) -> Result<String> {
    let hashed = hex_sha256(chunk);
    build(ALGORITHM_PAYLOAD, time, scope, &[prev_signature, hashed.as_str()])
}

/// StringToSign for the trailing headers of a streamed body.
///
/// `canonical_trailer` is the `name:value\n` rendering of the trailer.
pub fn trailer_string_to_sign(
    time: DateTime,
    scope: &Scope,
    prev_signature: &str,
    canonical_trailer: &str,
) -> Result<String> {
    let hashed = hex_sha256(canonical_trailer.as_bytes());
    build(ALGORITHM_TRAILER, time, scope, &[prev_signature, hashed.as_str()])
}

fn build(algorithm: &str, time: DateTime, scope: &Scope, tail: &[&str]) -> Result<String> {
    let mut f = String::with_capacity(256);
    writeln!(f, "{algorithm}")?;
    writeln!(f, "{}", format_iso8601(time))?;
    write!(f, "{scope}")?;
    for line in tail {
        write!(f, "\n{line}")?;
    }
    Ok(f)
}
