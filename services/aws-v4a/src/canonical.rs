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

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::SeekFrom;

use http::HeaderMap;
use percent_encoding::utf8_percent_encode;
use sigv4a_core::hash::{hex_sha256, hex_sha256_reader};
use sigv4a_core::{Error, Result, SignableBody, SigningRequest};

use crate::config::PayloadSigning;
use crate::constants::{
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, SKIPPED_HEADERS, STREAMING_PAYLOAD,
    STREAMING_PAYLOAD_TRAILER, UNSIGNED_PAYLOAD,
};

/// CanonicalRequest is the normalized form of a request that gets signed.
///
/// ```text
/// GET
/// /
///
/// host:example.amazonaws.com
/// x-amz-date:20150830T123600Z
/// x-amz-region-set:*
///
/// host;x-amz-date;x-amz-region-set
/// UNSIGNED-PAYLOAD
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Upper case method.
    pub method: String,
    /// Encoded path.
    pub path: String,
    /// Encoded and sorted query.
    pub query: String,
    /// Lower case header names with their normalized values, sorted by name.
    pub headers: Vec<(String, String)>,
    /// Header names joined by `;`.
    pub signed_headers: String,
    /// Hex SHA256 of the body or one of the payload sentinels.
    pub payload_hash: String,
}

impl CanonicalRequest {
    /// Canonicalize `req`.
    ///
    /// The request is read only; callers add the signing headers or query
    /// parameters before canonicalizing.
    pub fn build(
        req: &SigningRequest,
        payload_hash: &str,
        double_uri_encode: bool,
        normalize_path: bool,
    ) -> Result<Self> {
        let headers = canonical_headers(&req.headers)?;
        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        Ok(Self {
            method: req.method.as_str().to_ascii_uppercase(),
            path: canonical_path(&req.path, double_uri_encode, normalize_path),
            query: canonical_query(&req.query),
            headers,
            signed_headers,
            payload_hash: payload_hash.to_string(),
        })
    }
}

impl Display for CanonicalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.query)?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers)?;
        write!(f, "{}", self.payload_hash)
    }
}

/// Render `path` the way it is signed.
///
/// `path` is taken as sent, still percent encoded: `%2F` and `/` sign
/// differently. Double encoding escapes it once more, so `%2F` signs as
/// `%252F`.
pub fn canonical_path(path: &str, double_uri_encode: bool, normalize_path: bool) -> String {
    let path = if normalize_path {
        remove_dot_segments(path)
    } else {
        path.to_string()
    };
    if path.is_empty() {
        return "/".to_string();
    }

    if double_uri_encode {
        utf8_percent_encode(&path, &AWS_URI_ENCODE_SET).to_string()
    } else {
        path
    }
}

/// Drop `.` segments, resolve `..` against the previous one and collapse
/// repeated slashes. A trailing slash survives.
fn remove_dot_segments(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    normalized.push_str(&segments.join("/"));
    if !segments.is_empty()
        && (path.ends_with('/') || path.ends_with("/.") || path.ends_with("/.."))
    {
        normalized.push('/');
    }
    normalized
}

/// Encode every key and value of the decoded `query`, then sort by key and value.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lower case names with normalized values, duplicates joined by `,`.
///
/// Headers in the skip list are left out.
pub fn canonical_headers(headers: &HeaderMap) -> Result<Vec<(String, String)>> {
    let mut canonical = BTreeMap::new();
    for name in headers.keys() {
        let name = name.as_str();
        if SKIPPED_HEADERS.contains(&name) {
            continue;
        }

        let mut values = Vec::new();
        for value in headers.get_all(name) {
            values.push(normalize_header_value(value.to_str()?));
        }
        canonical.insert(name.to_string(), values.join(","));
    }

    Ok(canonical.into_iter().collect())
}

/// Trim the value and collapse inner whitespace runs into one space.
pub fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Work out the payload hash line for `body` under `mode`.
///
/// Seekable bodies are rewound to where they started once hashed.
pub fn payload_hash(body: SignableBody<'_>, mode: PayloadSigning) -> Result<String> {
    match mode {
        PayloadSigning::Unsigned => Ok(UNSIGNED_PAYLOAD.to_string()),
        PayloadSigning::Streaming => Ok(STREAMING_PAYLOAD.to_string()),
        PayloadSigning::StreamingWithTrailer => Ok(STREAMING_PAYLOAD_TRAILER.to_string()),
        PayloadSigning::Signed => match body {
            SignableBody::Bytes(bs) => Ok(hex_sha256(bs)),
            SignableBody::Seekable(r) => {
                let start = r.stream_position()?;
                let hash = hex_sha256_reader(&mut *r)?;
                r.seek(SeekFrom::Start(start))?;
                Ok(hash)
            }
            SignableBody::NonSeekable(_) => Err(Error::unsupported_payload(
                "signed payload needs a body that can be read twice",
            )),
            SignableBody::Precomputed(hash) => check_precomputed(hash),
        },
        PayloadSigning::PrecomputedHash => match body {
            SignableBody::Precomputed(hash) => check_precomputed(hash),
            body => Err(Error::unsupported_payload(format!(
                "precomputed hash mode needs a precomputed body, got {body:?}"
            ))),
        },
    }
}

fn check_precomputed(hash: String) -> Result<String> {
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::request_invalid(format!(
            "precomputed payload hash must be 64 hex characters: {hash}"
        )));
    }
    Ok(hash.to_ascii_lowercase())
}
