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

//! Checking signatures on the receiving side.

use chrono::TimeDelta;
use http::request::Parts;
use http::{header, HeaderMap};
use log::debug;
use p256::PublicKey;
use sigv4a_core::time::{format_date, format_iso8601, parse_iso8601, DateTime};
use sigv4a_core::{Context, Error, Result, SignableBody, SigningRequest};

use crate::canonical::{payload_hash, CanonicalRequest};
use crate::chunk::canonical_trailer;
use crate::config::{PayloadSigning, SigningConfig};
use crate::constants::*;
use crate::ecdsa;
use crate::key::derive_key_pair;
use crate::string_to_sign::{chunk_string_to_sign, string_to_sign, trailer_string_to_sign};
use crate::{Credential, RegionSet, Scope};

/// Authentication values pulled out of a signed request.
#[derive(Debug)]
struct Authentication {
    access_key_id: String,
    scope: Scope,
    time: DateTime,
    signed_headers: String,
    signature: String,
}

/// Verify a request signed in header or query mode.
///
/// Returns `Ok(false)` when the request is well formed but not authentic
/// for `credential` at `region` and `service`. Requests carrying no
/// signature or a malformed one fail with `RequestInvalid`, presigned
/// requests past their expiry fail with `SigningExpired`.
pub fn verify_request(
    ctx: &Context,
    parts: &Parts,
    body: SignableBody<'_>,
    credential: &Credential,
    region: &str,
    service: &str,
) -> Result<bool> {
    let mut req = SigningRequest::build(parts)?;
    let auth = match req.headers.get(header::AUTHORIZATION) {
        Some(value) => parse_authorization(value.to_str()?, &req.headers)?,
        None => parse_query(ctx, &mut req)?,
    };

    if auth.access_key_id != credential.access_key_id {
        debug!("signature made for another access key");
        return Ok(false);
    }
    if auth.scope.service() != service || !auth.scope.region_set().contains(region) {
        debug!("scope {} doesn't cover {region}/{service}", auth.scope);
        return Ok(false);
    }
    if auth.scope.date() != format_date(auth.time) {
        debug!("scope date doesn't match signing time");
        return Ok(false);
    }

    // Only the headers covered by the signature take part in the check.
    let signed: Vec<&str> = auth.signed_headers.split(';').collect();
    let mut headers = HeaderMap::new();
    for (name, value) in req.headers.iter() {
        if signed.contains(&name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    req.headers = headers;

    let payload_hash = match req.headers.get(X_AMZ_CONTENT_SHA_256) {
        None => UNSIGNED_PAYLOAD.to_string(),
        Some(v) => {
            let claimed = v.to_str()?;
            if [UNSIGNED_PAYLOAD, STREAMING_PAYLOAD, STREAMING_PAYLOAD_TRAILER].contains(&claimed) {
                claimed.to_string()
            } else {
                let actual = payload_hash(body, PayloadSigning::Signed)?;
                if actual != claimed {
                    debug!("payload hash mismatch");
                    return Ok(false);
                }
                actual
            }
        }
    };

    // Path rewriting follows the same per-service defaults as signing.
    let defaults = SigningConfig::new(service, RegionSet::Any);
    let creq = CanonicalRequest::build(
        &req,
        &payload_hash,
        defaults.double_uri_encode,
        defaults.normalize_path,
    )?;
    if creq.signed_headers != auth.signed_headers {
        debug!("signed headers missing from request");
        return Ok(false);
    }
    let creq = creq.to_string();
    debug!("calculated canonical request: {creq}");

    let string_to_sign = string_to_sign(auth.time, &auth.scope, &creq)?;
    debug!("calculated string to sign: {string_to_sign}");

    let key = derive_key_pair(&credential.access_key_id, &credential.secret_access_key)?;
    Ok(ecdsa::verify(
        key.public_key(),
        string_to_sign.as_bytes(),
        &auth.signature,
    ))
}

/// Check one chunk signature against the previous link of the chain.
///
/// `signature` may still carry the `*` padding of the wire frame.
pub fn verify_chunk(
    public: &PublicKey,
    time: DateTime,
    scope: &Scope,
    prev_signature: &str,
    chunk: &[u8],
    signature: &str,
) -> Result<bool> {
    let string_to_sign = chunk_string_to_sign(time, scope, prev_signature, chunk)?;
    Ok(ecdsa::verify(
        public,
        string_to_sign.as_bytes(),
        signature.trim_end_matches('*'),
    ))
}

/// Check the trailer signature against the final chunk signature.
pub fn verify_trailer(
    public: &PublicKey,
    time: DateTime,
    scope: &Scope,
    prev_signature: &str,
    trailers: &HeaderMap,
    signature: &str,
) -> Result<bool> {
    let string_to_sign =
        trailer_string_to_sign(time, scope, prev_signature, &canonical_trailer(trailers)?)?;
    Ok(ecdsa::verify(
        public,
        string_to_sign.as_bytes(),
        signature.trim_end_matches('*'),
    ))
}

/// Parse `AWS4-ECDSA-P256-SHA256 Credential=<ak>/<scope>, SignedHeaders=<list>, Signature=<sig>`.
fn parse_authorization(value: &str, headers: &HeaderMap) -> Result<Authentication> {
    let Some(rest) = value.strip_prefix(ALGORITHM) else {
        return Err(Error::request_invalid(format!(
            "unsupported authorization algorithm: {value}"
        )));
    };

    // The scope of a region list carries commas itself, so a piece only
    // starts a new field when it opens with a known key.
    let mut fields: Vec<String> = Vec::new();
    for piece in rest.split(',') {
        let starts_field = ["Credential=", "SignedHeaders=", "Signature="]
            .iter()
            .any(|key| piece.trim_start().starts_with(key));
        match fields.last_mut() {
            Some(field) if !starts_field => {
                field.push(',');
                field.push_str(piece);
            }
            _ => fields.push(piece.to_string()),
        }
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for field in &fields {
        match field.trim().split_once('=') {
            Some(("Credential", v)) => credential = Some(v),
            Some(("SignedHeaders", v)) => signed_headers = Some(v),
            Some(("Signature", v)) => signature = Some(v),
            _ => {
                return Err(Error::request_invalid(format!(
                    "malformed authorization field: {field}"
                )))
            }
        }
    }

    let (Some(credential), Some(signed_headers), Some(signature)) =
        (credential, signed_headers, signature)
    else {
        return Err(Error::request_invalid("incomplete authorization header"));
    };
    let (access_key_id, scope) = parse_credential(credential)?;

    let Some(date) = headers.get(X_AMZ_DATE) else {
        return Err(Error::request_invalid("missing x-amz-date header"));
    };

    Ok(Authentication {
        access_key_id,
        scope,
        time: parse_iso8601(date.to_str()?)?,
        signed_headers: signed_headers.to_string(),
        signature: signature.to_string(),
    })
}

/// Pull the presign parameters out of the query.
///
/// `X-Amz-Signature` is removed, it's not part of what was signed.
fn parse_query(ctx: &Context, req: &mut SigningRequest) -> Result<Authentication> {
    match req.query_get(X_AMZ_ALGORITHM) {
        Some(ALGORITHM) => {}
        Some(v) => {
            return Err(Error::request_invalid(format!(
                "unsupported presign algorithm: {v}"
            )))
        }
        None => return Err(Error::request_invalid("request is not signed")),
    }

    let get = |key: &str| -> Result<String> {
        req.query_get(key)
            .map(|v| v.to_string())
            .ok_or_else(|| Error::request_invalid(format!("missing query parameter {key}")))
    };
    let (access_key_id, scope) = parse_credential(&get(X_AMZ_CREDENTIAL)?)?;
    let time = parse_iso8601(&get(X_AMZ_DATE_QUERY)?)?;
    let expires: u64 = get(X_AMZ_EXPIRES)?
        .parse()
        .map_err(|_| Error::request_invalid("X-Amz-Expires must be a number of seconds"))?;
    if expires == 0 || expires > MAX_PRESIGN_DURATION.as_secs() {
        return Err(Error::signing_expired(format!(
            "X-Amz-Expires out of range: {expires}"
        )));
    }
    let signed_headers = get(X_AMZ_SIGNED_HEADERS)?;
    let signature = get(X_AMZ_SIGNATURE)?;

    if ctx.now() > time + TimeDelta::seconds(expires as i64) {
        return Err(Error::signing_expired(format!(
            "presigned request expired {expires}s after {}",
            format_iso8601(time)
        )));
    }

    req.query.retain(|(k, _)| k != X_AMZ_SIGNATURE);
    Ok(Authentication {
        access_key_id,
        scope,
        time,
        signed_headers,
        signature,
    })
}

fn parse_credential(credential: &str) -> Result<(String, Scope)> {
    let Some((access_key_id, scope)) = credential.split_once('/') else {
        return Err(Error::request_invalid(format!(
            "malformed credential: {credential}"
        )));
    };
    Ok((access_key_id.to_string(), Scope::parse(scope)?))
}
