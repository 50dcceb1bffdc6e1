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

use std::time::Duration;

use sigv4a_core::{Context, Error, Result, SigningMethod};

use crate::constants::{AWS_SIGV4A_SIGNING_REGION_SET, MAX_PRESIGN_DURATION};
use crate::RegionSet;

/// How the request payload takes part in the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSigning {
    /// SHA256 of the whole body is signed.
    Signed,
    /// The `UNSIGNED-PAYLOAD` sentinel is signed instead of the body.
    Unsigned,
    /// The caller supplies the body hash with [`SignableBody::Precomputed`](sigv4a_core::SignableBody::Precomputed).
    PrecomputedHash,
    /// The body is sent as signed aws-chunked frames.
    Streaming,
    /// Like `Streaming`, followed by signed trailing headers.
    StreamingWithTrailer,
}

impl PayloadSigning {
    /// Returns true if the body is sent as signed chunks.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            PayloadSigning::Streaming | PayloadSigning::StreamingWithTrailer
        )
    }
}

/// Config for a single signing call.
///
/// The config is an immutable value: the signer never keeps or changes it,
/// so the same config can sign many requests concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Regions the signature is valid against.
    pub region_set: RegionSet,
    /// Service name used in the scope, like `s3`.
    pub service: String,
    /// How the payload is signed.
    pub payload: PayloadSigning,
    /// Percent encode the already encoded path once more.
    ///
    /// Every service except S3 expects this.
    pub double_uri_encode: bool,
    /// Collapse `.` and `..` path segments before encoding.
    pub normalize_path: bool,
    /// Where to put the signature.
    pub method: SigningMethod,
}

impl SigningConfig {
    /// Create a config for header signing with an unsigned payload.
    ///
    /// S3 signs the path as sent, so both path options are off for `s3`.
    pub fn new(service: &str, region_set: RegionSet) -> Self {
        let rewrite_path = service != "s3";
        Self {
            region_set,
            service: service.to_string(),
            payload: PayloadSigning::Unsigned,
            double_uri_encode: rewrite_path,
            normalize_path: rewrite_path,
            method: SigningMethod::Header,
        }
    }

    /// Create a config whose region set comes from `AWS_SIGV4A_SIGNING_REGION_SET`.
    ///
    /// Falls back to the wildcard when the variable is not set.
    pub fn from_env(ctx: &Context, service: &str) -> Result<Self> {
        let region_set = match ctx.env_var(AWS_SIGV4A_SIGNING_REGION_SET) {
            Some(v) => v.parse()?,
            None => RegionSet::Any,
        };
        Ok(Self::new(service, region_set))
    }

    /// Set the payload signing mode.
    pub fn with_payload(mut self, payload: PayloadSigning) -> Self {
        self.payload = payload;
        self
    }

    /// Set the URI double encoding flag.
    pub fn with_double_uri_encode(mut self, enabled: bool) -> Self {
        self.double_uri_encode = enabled;
        self
    }

    /// Set the path normalization flag.
    pub fn with_normalize_path(mut self, enabled: bool) -> Self {
        self.normalize_path = enabled;
        self
    }

    /// Sign with query parameters, valid for `expires_in`.
    pub fn with_presign(mut self, expires_in: Duration) -> Self {
        self.method = SigningMethod::Query(expires_in);
        self
    }

    /// Check the config can be used for signing.
    pub fn validate(&self) -> Result<()> {
        if self.service.is_empty() {
            return Err(Error::config_invalid("service must not be empty"));
        }
        if self.service.contains('/') {
            return Err(Error::config_invalid(format!(
                "service must not contain '/': {}",
                self.service
            )));
        }
        if let RegionSet::Regions(regions) = &self.region_set {
            if regions.is_empty() {
                return Err(Error::config_invalid("region set must not be empty"));
            }
        }

        if let SigningMethod::Query(expires_in) = self.method {
            if expires_in.is_zero() {
                return Err(Error::signing_expired(
                    "presign expiry must be greater than zero",
                ));
            }
            if expires_in > MAX_PRESIGN_DURATION {
                return Err(Error::signing_expired(format!(
                    "presign expiry {}s exceeds the maximum of {}s",
                    expires_in.as_secs(),
                    MAX_PRESIGN_DURATION.as_secs()
                )));
            }
            if self.payload.is_streaming() {
                return Err(Error::config_invalid(
                    "streaming payloads can't be presigned",
                ));
            }
        }

        Ok(())
    }
}
