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

use std::sync::Arc;

use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use sigv4a_core::time::{format_iso8601, DateTime};
use sigv4a_core::{
    Context, Error, Result, SignRequest, SignableBody, SigningCredential, SigningMethod,
    SigningRequest,
};

use crate::canonical::{payload_hash, CanonicalRequest};
use crate::chunk::ChunkSigner;
use crate::config::{PayloadSigning, SigningConfig};
use crate::constants::*;
use crate::ecdsa::{self, NonceSource, OsNonce};
use crate::key::{DerivedKeyPair, KeyCache};
use crate::string_to_sign::string_to_sign;
use crate::{Credential, Scope};

/// RequestSigner signs requests with region-set scoped ECDSA signatures.
///
/// The signer holds no per-request state: the region set, service and
/// payload mode come from the [`SigningConfig`] passed to every call.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    nonce: Arc<dyn NonceSource>,
    keys: Arc<KeyCache>,
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSigner {
    /// Create a new signer using OS randomness and a private key cache.
    pub fn new() -> Self {
        Self {
            nonce: Arc::new(OsNonce),
            keys: Arc::new(KeyCache::new()),
        }
    }

    /// Replace the nonce source.
    ///
    /// # Note
    ///
    /// A fixed nonce makes signatures reproducible and leaks the private
    /// key. Only use this for testing.
    pub fn with_nonce_source(mut self, nonce: impl NonceSource) -> Self {
        self.nonce = Arc::new(nonce);
        self
    }

    /// Share a key cache between signers.
    pub fn with_key_cache(mut self, keys: Arc<KeyCache>) -> Self {
        self.keys = keys;
        self
    }

    /// The key cache used by this signer.
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Sign `req` and return the signed copy along with the signing state.
    ///
    /// `req` is never touched. On error nothing is returned, there is no
    /// partially signed request.
    pub fn sign(
        &self,
        ctx: &Context,
        req: &Parts,
        body: SignableBody<'_>,
        cred: &Credential,
        config: &SigningConfig,
    ) -> Result<SignedRequest> {
        config.validate()?;

        let now = ctx.now();
        if cred.access_key_id.is_empty() || cred.secret_access_key.is_empty() {
            return Err(Error::missing_credentials(
                "access key id and secret access key are required",
            ));
        }
        if !cred.is_valid(now) {
            return Err(Error::missing_credentials("credential is expired"));
        }

        let payload_hash = payload_hash(body, config.payload)?;
        let mut signed_req = SigningRequest::build(req)?;
        let scope = Scope::new(now, &config.region_set, &config.service);
        debug!("calculated scope: {scope}");

        canonicalize_header(&mut signed_req, cred, config, &payload_hash, now)?;
        if let SigningMethod::Query(expires_in) = config.method {
            canonicalize_query(&mut signed_req, cred, config, &scope, expires_in, now)?;
        }

        let creq = CanonicalRequest::build(
            &signed_req,
            &payload_hash,
            config.double_uri_encode,
            config.normalize_path,
        )?;
        let creq = creq.to_string();
        debug!("calculated canonical request: {creq}");

        let string_to_sign = string_to_sign(now, &scope, &creq)?;
        debug!("calculated string to sign: {string_to_sign}");

        let key = self.keys.get_or_derive(cred, now)?;
        let signature = ecdsa::sign(&key, string_to_sign.as_bytes(), self.nonce.as_ref())?;

        match config.method {
            SigningMethod::Query(_) => {
                signed_req.query_push(X_AMZ_SIGNATURE, signature.as_str());
            }
            SigningMethod::Header => {
                let signed_headers = signed_header_names(&signed_req)?;
                let mut authorization = HeaderValue::from_str(&format!(
                    "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                    cred.access_key_id,
                ))?;
                authorization.set_sensitive(true);
                signed_req
                    .headers
                    .insert(header::AUTHORIZATION, authorization);
            }
        }

        Ok(SignedRequest {
            parts: signed_req.into_parts(req.version)?,
            signature,
            scope,
            time: now,
            payload: config.payload,
            key,
            nonce: self.nonce.clone(),
        })
    }
}

impl SignRequest for RequestSigner {
    type Credential = Credential;
    type Config = SigningConfig;

    fn sign_request(
        &self,
        ctx: &Context,
        req: &Parts,
        body: SignableBody<'_>,
        credential: &Self::Credential,
        config: &Self::Config,
    ) -> Result<Parts> {
        self.sign(ctx, req, body, credential, config)
            .map(SignedRequest::into_parts)
    }
}

/// SignedRequest is the outcome of [`RequestSigner::sign`].
pub struct SignedRequest {
    parts: Parts,
    signature: String,
    scope: Scope,
    time: DateTime,
    payload: PayloadSigning,
    key: Arc<DerivedKeyPair>,
    nonce: Arc<dyn NonceSource>,
}

impl SignedRequest {
    /// The signed request.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Take the signed request.
    pub fn into_parts(self) -> Parts {
        self.parts
    }

    /// Hex encoded DER signature of the request.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Scope the request was signed under.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Signing time.
    pub fn time(&self) -> DateTime {
        self.time
    }

    /// Start signing the body chunks of a streaming request.
    ///
    /// The chain is seeded with the request signature.
    pub fn chunk_signer(&self) -> Result<ChunkSigner> {
        if !self.payload.is_streaming() {
            return Err(Error::unsupported_payload(
                "chunk signing needs a streaming payload mode",
            ));
        }

        Ok(ChunkSigner::new(
            self.key.clone(),
            self.nonce.clone(),
            self.scope.clone(),
            self.time,
            &self.signature,
            self.payload == PayloadSigning::StreamingWithTrailer,
        ))
    }
}

impl std::fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRequest")
            .field("parts", &self.parts)
            .field("signature", &self.signature)
            .field("scope", &self.scope)
            .field("time", &self.time)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

fn canonicalize_header(
    req: &mut SigningRequest,
    cred: &Credential,
    config: &SigningConfig,
    payload_hash: &str,
    now: DateTime,
) -> Result<()> {
    // Insert HOST header if not present.
    if req.headers.get(header::HOST).is_none() {
        req.headers
            .insert(header::HOST, req.authority.as_str().parse()?);
    }

    if config.payload != PayloadSigning::Unsigned {
        req.headers
            .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(payload_hash)?);
    }

    if config.method != SigningMethod::Header {
        return Ok(());
    }

    req.headers
        .insert(X_AMZ_DATE, HeaderValue::from_str(&format_iso8601(now))?);
    req.headers.insert(
        X_AMZ_REGION_SET,
        HeaderValue::from_str(&config.region_set.to_string())?,
    );

    // Insert X_AMZ_SECURITY_TOKEN header if security token exists.
    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token)?;
        // Keep the token out of debug output.
        value.set_sensitive(true);

        req.headers.insert(X_AMZ_SECURITY_TOKEN, value);
    }

    Ok(())
}

fn canonicalize_query(
    req: &mut SigningRequest,
    cred: &Credential,
    config: &SigningConfig,
    scope: &Scope,
    expires_in: std::time::Duration,
    now: DateTime,
) -> Result<()> {
    let signed_headers = signed_header_names(req)?;

    req.query_push(X_AMZ_ALGORITHM, ALGORITHM);
    req.query_push(
        X_AMZ_CREDENTIAL,
        format!("{}/{scope}", cred.access_key_id),
    );
    req.query_push(X_AMZ_DATE_QUERY, format_iso8601(now));
    req.query_push(X_AMZ_EXPIRES, expires_in.as_secs().to_string());
    req.query_push(X_AMZ_REGION_SET_QUERY, config.region_set.to_string());
    req.query_push(X_AMZ_SIGNED_HEADERS, signed_headers);

    if let Some(token) = &cred.session_token {
        req.query_push(X_AMZ_SECURITY_TOKEN_QUERY, token.as_str());
    }

    Ok(())
}

fn signed_header_names(req: &SigningRequest) -> Result<String> {
    Ok(crate::canonical::canonical_headers(&req.headers)?
        .into_iter()
        .map(|(k, _)| k)
        .collect::<Vec<_>>()
        .join(";"))
}
