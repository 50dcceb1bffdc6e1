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

//! Signing of aws-chunked bodies.
//!
//! ```text
//! 10000;chunk-signature=<sig>\r\n<65536 bytes>\r\n
//! 400;chunk-signature=<sig>\r\n<1024 bytes>\r\n
//! 0;chunk-signature=<sig>\r\n\r\n
//! ```
//!
//! With trailing headers the final frame is followed by the trailer:
//!
//! ```text
//! 0;chunk-signature=<sig>\r\n
//! x-amz-checksum-crc32:AAAAAA==\r\n
//! x-amz-trailer-signature:<sig>\r\n
//! \r\n
//! ```

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use http::HeaderMap;
use log::debug;
use sigv4a_core::time::DateTime;
use sigv4a_core::{Error, Result};

use crate::canonical::canonical_headers;
use crate::constants::{CHUNK_SIGNATURE_WIDTH, X_AMZ_TRAILER_SIGNATURE};
use crate::ecdsa::{self, NonceSource};
use crate::key::DerivedKeyPair;
use crate::string_to_sign::{chunk_string_to_sign, trailer_string_to_sign};
use crate::Scope;

const CHUNK_SIGNATURE_PREFIX: &str = ";chunk-signature=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    AwaitingTrailer,
    Done,
}

/// ChunkSigner signs the body of a streaming request chunk by chunk.
///
/// Every signature is chained from the previous one, starting with the
/// request signature. The zero length final chunk must always be signed;
/// with trailing headers the trailer is signed last. Any call after the
/// chain is complete fails with `ChunkSequence`.
pub struct ChunkSigner {
    key: Arc<DerivedKeyPair>,
    nonce: Arc<dyn NonceSource>,
    scope: Scope,
    time: DateTime,
    prev_signature: String,
    with_trailer: bool,
    state: State,
}

impl ChunkSigner {
    pub(crate) fn new(
        key: Arc<DerivedKeyPair>,
        nonce: Arc<dyn NonceSource>,
        scope: Scope,
        time: DateTime,
        seed_signature: &str,
        with_trailer: bool,
    ) -> Self {
        Self {
            key,
            nonce,
            scope,
            time,
            prev_signature: seed_signature.to_string(),
            with_trailer,
            state: State::Streaming,
        }
    }

    /// Signature the next link is chained from.
    pub fn prev_signature(&self) -> &str {
        &self.prev_signature
    }

    /// Returns true once the final chunk (and trailer, if any) is signed.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Sign the next chunk. An empty chunk is the final one.
    pub fn sign_chunk(&mut self, chunk: &[u8]) -> Result<String> {
        if self.state != State::Streaming {
            return Err(Error::chunk_sequence(
                "no chunk can be signed after the final chunk",
            ));
        }

        let string_to_sign =
            chunk_string_to_sign(self.time, &self.scope, &self.prev_signature, chunk)?;
        debug!("calculated chunk string to sign: {string_to_sign}");
        let signature = ecdsa::sign(&self.key, string_to_sign.as_bytes(), self.nonce.as_ref())?;

        if chunk.is_empty() {
            self.state = if self.with_trailer {
                State::AwaitingTrailer
            } else {
                State::Done
            };
        }
        self.prev_signature.clone_from(&signature);
        Ok(signature)
    }

    /// Sign the trailing headers, chained from the final chunk.
    pub fn sign_trailer(&mut self, trailers: &HeaderMap) -> Result<String> {
        match self.state {
            State::AwaitingTrailer => {}
            State::Streaming => {
                return Err(Error::chunk_sequence(
                    "the final chunk must be signed before the trailer",
                ))
            }
            State::Done => {
                return Err(Error::chunk_sequence(
                    "no trailer expected after the final chunk",
                ))
            }
        }

        let string_to_sign = trailer_string_to_sign(
            self.time,
            &self.scope,
            &self.prev_signature,
            &canonical_trailer(trailers)?,
        )?;
        debug!("calculated trailer string to sign: {string_to_sign}");
        let signature = ecdsa::sign(&self.key, string_to_sign.as_bytes(), self.nonce.as_ref())?;

        self.state = State::Done;
        self.prev_signature.clone_from(&signature);
        Ok(signature)
    }

    /// Sign `chunk` and frame it for the wire.
    pub fn encode_chunk(&mut self, chunk: &[u8]) -> Result<Bytes> {
        let signature = self.sign_chunk(chunk)?;

        let mut buf = BytesMut::with_capacity(chunk.len() + CHUNK_SIGNATURE_WIDTH + 32);
        buf.put_slice(format!("{:x}", chunk.len()).as_bytes());
        buf.put_slice(CHUNK_SIGNATURE_PREFIX.as_bytes());
        buf.put_slice(pad_signature(&signature).as_bytes());
        buf.put_slice(b"\r\n");
        // The final frame of a body with trailer goes straight into the trailer.
        if !(chunk.is_empty() && self.with_trailer) {
            buf.put_slice(chunk);
            buf.put_slice(b"\r\n");
        }
        Ok(buf.freeze())
    }

    /// Sign `trailers` and frame them for the wire.
    pub fn encode_trailer(&mut self, trailers: &HeaderMap) -> Result<Bytes> {
        let signature = self.sign_trailer(trailers)?;

        let mut buf = BytesMut::new();
        for (name, value) in canonical_headers(trailers)? {
            buf.put_slice(format!("{name}:{value}\r\n").as_bytes());
        }
        buf.put_slice(
            format!(
                "{X_AMZ_TRAILER_SIGNATURE}:{}\r\n\r\n",
                pad_signature(&signature)
            )
            .as_bytes(),
        );
        Ok(buf.freeze())
    }
}

impl Debug for ChunkSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSigner")
            .field("scope", &self.scope)
            .field("time", &self.time)
            .field("prev_signature", &self.prev_signature)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Render trailing headers the way they are hashed for signing.
pub fn canonical_trailer(trailers: &HeaderMap) -> Result<String> {
    Ok(canonical_headers(trailers)?
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect())
}

/// DER signatures vary in length, frames always carry the same width.
fn pad_signature(signature: &str) -> String {
    format!("{signature:*<width$}", width = CHUNK_SIGNATURE_WIDTH)
}

/// Length of the aws-chunked encoding of a `decoded_len` byte body split
/// into `chunk_size` chunks, for the `content-length` header.
pub fn signed_content_length(
    decoded_len: u64,
    chunk_size: u64,
    trailers: Option<&HeaderMap>,
) -> Result<u64> {
    if chunk_size == 0 {
        return Err(Error::config_invalid("chunk size must be greater than zero"));
    }

    let frame_header = |len: u64| -> u64 {
        format!("{len:x}").len() as u64
            + CHUNK_SIGNATURE_PREFIX.len() as u64
            + CHUNK_SIGNATURE_WIDTH as u64
            + 2
    };

    let full_chunks = decoded_len / chunk_size;
    let remainder = decoded_len % chunk_size;

    let mut total = full_chunks * (frame_header(chunk_size) + chunk_size + 2);
    if remainder > 0 {
        total += frame_header(remainder) + remainder + 2;
    }
    total += frame_header(0);

    match trailers {
        None => total += 2,
        Some(trailers) => {
            for (name, value) in canonical_headers(trailers)? {
                total += (name.len() + 1 + value.len() + 2) as u64;
            }
            total += (X_AMZ_TRAILER_SIGNATURE.len() + 1 + CHUNK_SIGNATURE_WIDTH + 4) as u64;
        }
    }
    Ok(total)
}
