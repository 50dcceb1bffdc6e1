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

use std::fmt::{Debug, Formatter};
use std::io::{Read, Seek};
use std::str::FromStr;
use std::time::Duration;

use http::request::Parts;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, HeaderName, Method, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{Error, Result};

/// Unreserved characters of RFC 3986 are kept, everything else is escaped.
static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signing context for request.
///
/// Built from a borrowed `http::request::Parts`, the caller's request is
/// never touched. Signers work on this copy and turn it into a new `Parts`
/// with [`SigningRequest::into_parts`].
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path, as it appears in the URI (still percent encoded).
    pub path: String,
    /// HTTP query parameters, percent decoded, in original order.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &Parts) -> Result<Self> {
        let uri = parts.uri.clone().into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTP),
            authority: uri.authority.ok_or_else(|| {
                Error::request_invalid("request without authority is invalid for signing")
            })?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),
            headers: parts.headers.clone(),
        })
    }

    /// Turn the signing context into a new `http::request::Parts`.
    ///
    /// Query pairs are percent encoded with the RFC 3986 unreserved set, so
    /// values pushed into `query` must be in decoded form.
    pub fn into_parts(self, version: http::Version) -> Result<Parts> {
        let mut paq = self.path;
        if !self.query.is_empty() {
            paq.push('?');
            for (i, (k, v)) in self.query.iter().enumerate() {
                if i > 0 {
                    paq.push('&');
                }
                paq.extend(utf8_percent_encode(k, &QUERY_ENCODE_SET));
                paq.push('=');
                paq.extend(utf8_percent_encode(v, &QUERY_ENCODE_SET));
            }
        }

        let uri = {
            let mut uri_parts = http::uri::Parts::default();
            uri_parts.scheme = Some(self.scheme);
            uri_parts.authority = Some(self.authority);
            uri_parts.path_and_query = Some(PathAndQuery::from_str(&paq)?);
            Uri::from_parts(uri_parts)?
        };

        let (mut parts, _) = http::Request::new(()).into_parts();
        parts.method = self.method;
        parts.uri = uri;
        parts.version = version;
        parts.headers = self.headers;
        Ok(parts)
    }

    /// Push a new query pair into query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Get the first query value for the given key.
    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get header value by name.
    ///
    /// Returns empty string if header not found.
    #[inline]
    pub fn header_get_or_default(&self, key: &HeaderName) -> Result<&str> {
        match self.headers.get(key) {
            Some(v) => Ok(v.to_str()?),
            None => Ok(""),
        }
    }
}

/// Anything that can be both read and rewound.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// SignableBody is the closed set of body shapes a signer accepts.
///
/// Which variants are usable depends on the payload signing mode, see the
/// signer's documentation for the exact rules.
pub enum SignableBody<'a> {
    /// The whole body is in memory.
    Bytes(&'a [u8]),
    /// A stream that can be read for hashing and rewound afterwards.
    Seekable(&'a mut dyn ReadSeek),
    /// A stream that can only be read once.
    NonSeekable(&'a mut dyn Read),
    /// The caller already knows the hex encoded SHA256 of the body.
    Precomputed(String),
}

impl SignableBody<'_> {
    /// An empty in-memory body.
    pub fn empty() -> Self {
        SignableBody::Bytes(&[])
    }
}

impl Debug for SignableBody<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SignableBody::Bytes(bs) => write!(f, "Bytes({} bytes)", bs.len()),
            SignableBody::Seekable(_) => f.write_str("Seekable"),
            SignableBody::NonSeekable(_) => f.write_str("NonSeekable"),
            SignableBody::Precomputed(h) => write!(f, "Precomputed({h})"),
        }
    }
}

/// SigningMethod is the method that used in signing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigningMethod {
    /// Signing with header.
    Header,
    /// Signing with query, the signature expires after the given duration.
    Query(Duration),
}
