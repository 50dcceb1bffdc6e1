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

//! Deterministic P-256 key derivation from a secret access key.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::{BufMut, BytesMut};
use log::debug;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::elliptic_curve::PrimeField;
use p256::{FieldBytes, NonZeroScalar, PublicKey, Scalar};
use sigv4a_core::hash::{hmac_sha256, sha256};
use sigv4a_core::time::DateTime;
use sigv4a_core::utils::Redact;
use sigv4a_core::{Error, Result};
use zeroize::{Zeroize, Zeroizing};

use crate::constants::{ALGORITHM, MAX_KEY_DERIVATION_COUNTER};
use crate::Credential;

/// DerivedKeyPair is the P-256 key pair derived from a credential.
///
/// The private scalar is wiped when the pair is dropped.
#[derive(Clone)]
pub struct DerivedKeyPair {
    access_key_id: String,
    secret: NonZeroScalar,
    public: PublicKey,
}

impl DerivedKeyPair {
    /// Access key id this pair was derived for.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The private scalar.
    pub fn secret_scalar(&self) -> &NonZeroScalar {
        &self.secret
    }

    /// The public key, used to verify signatures.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Uncompressed SEC1 encoding of the public key.
    pub fn public_key_sec1(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }
}

impl Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyPair")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("public", &hex::encode(self.public_key_sec1()))
            .finish_non_exhaustive()
    }
}

impl Drop for DerivedKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Derive the key pair for `access_key_id` and `secret_access_key`.
///
/// The derivation is a NIST SP 800-108 counter mode KDF over HMAC-SHA256:
///
/// ```text
/// input_key   = "AWS4A" || secret_access_key
/// fixed_input = be32(1) || "AWS4-ECDSA-P256-SHA256" || 0x00 || access_key_id || counter || be32(256)
/// k0          = HMAC-SHA256(input_key, fixed_input)
/// ```
///
/// The first counter whose `k0` is at most `n - 2` wins and the private key
/// is `k0 + 1`. The same inputs always yield the same pair.
pub fn derive_key_pair(access_key_id: &str, secret_access_key: &str) -> Result<DerivedKeyPair> {
    derive_with_counters(
        access_key_id,
        secret_access_key,
        1..=MAX_KEY_DERIVATION_COUNTER,
    )
}

fn derive_with_counters(
    access_key_id: &str,
    secret_access_key: &str,
    counters: RangeInclusive<u8>,
) -> Result<DerivedKeyPair> {
    let mut input_key = Zeroizing::new(Vec::with_capacity(secret_access_key.len() + 5));
    input_key.extend_from_slice(b"AWS4A");
    input_key.extend_from_slice(secret_access_key.as_bytes());

    let minus_one = -Scalar::ONE;
    for counter in counters {
        let mut fixed_input = BytesMut::with_capacity(ALGORITHM.len() + access_key_id.len() + 10);
        fixed_input.put_u32(1);
        fixed_input.put_slice(ALGORITHM.as_bytes());
        fixed_input.put_u8(0);
        fixed_input.put_slice(access_key_id.as_bytes());
        fixed_input.put_u8(counter);
        fixed_input.put_u32(256);

        let tag = Zeroizing::new(hmac_sha256(&input_key, &fixed_input));

        // from_repr only accepts k0 < n, n - 1 is excluded by hand.
        let k0: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(tag.as_slice())).into();
        let Some(k0) = k0.filter(|k| *k != minus_one) else {
            debug!("key derivation candidate {counter} out of range, retrying");
            continue;
        };

        let secret: Option<NonZeroScalar> = NonZeroScalar::new(k0 + Scalar::ONE).into();
        let Some(secret) = secret else {
            continue;
        };

        return Ok(DerivedKeyPair {
            access_key_id: access_key_id.to_string(),
            public: PublicKey::from_secret_scalar(&secret),
            secret,
        });
    }

    Err(Error::key_derivation_failure(format!(
        "no valid private key found for access key {:?}",
        Redact::from(access_key_id)
    )))
}

type CacheKey = (String, [u8; 32]);

#[derive(Clone)]
struct CacheEntry {
    pair: Arc<DerivedKeyPair>,
    expires_in: Option<DateTime>,
}

/// KeyCache keeps derived key pairs around so every signing call doesn't
/// pay for the derivation.
///
/// Entries are keyed by the access key id plus a digest of the secret, a
/// rotated secret never hits a stale pair. Entries of temporary credentials
/// expire together with the credential.
#[derive(Default)]
pub struct KeyCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pair for `cred`, deriving and caching it on a miss.
    pub fn get_or_derive(&self, cred: &Credential, now: DateTime) -> Result<Arc<DerivedKeyPair>> {
        let key = (
            cred.access_key_id.clone(),
            sha256(cred.secret_access_key.as_bytes()),
        );

        {
            let entries = self
                .entries
                .read()
                .map_err(|_| Error::unexpected("key cache lock poisoned"))?;
            if let Some(entry) = entries.get(&key) {
                if entry.expires_in.map(|t| t > now).unwrap_or(true) {
                    return Ok(entry.pair.clone());
                }
            }
        }

        let pair = Arc::new(derive_key_pair(
            &cred.access_key_id,
            &cred.secret_access_key,
        )?);
        debug!(
            "derived signing key for access key {:?}",
            Redact::from(&cred.access_key_id)
        );

        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::unexpected("key cache lock poisoned"))?;
        entries.retain(|_, e| e.expires_in.map(|t| t > now).unwrap_or(true));
        entries.insert(
            key,
            CacheEntry {
                pair: pair.clone(),
                expires_in: cred.expires_in,
            },
        );
        Ok(pair)
    }

    /// Drop every pair derived for `access_key_id`.
    ///
    /// Works on a poisoned lock too: removing entries is always safe.
    pub fn invalidate(&self, access_key_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(ak, _), _| ak != access_key_id);
    }

    /// Drop all cached pairs.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached pairs.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for KeyCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("len", &self.len())
            .finish()
    }
}
