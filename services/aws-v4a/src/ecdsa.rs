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

//! ECDSA over P-256 with SHA-256 and a pluggable nonce source.

use std::fmt::Debug;

use ecdsa::hazmat::SignPrimitive;
use log::debug;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::{FieldBytes, NistP256, NonZeroScalar, PublicKey, Scalar};
use rand::rngs::OsRng;
use sigv4a_core::hash::sha256;
use sigv4a_core::{Error, Result};

use crate::key::DerivedKeyPair;

/// Nonces drawn before giving up on a signature.
const MAX_SIGNING_ATTEMPTS: usize = 8;

/// NonceSource hands out the per-signature secret `k`.
///
/// Production code must use [`OsNonce`]. Reusing a nonce for two different
/// messages leaks the private key.
pub trait NonceSource: Debug + Send + Sync + 'static {
    /// Return a fresh non-zero scalar.
    fn nonce(&self) -> NonZeroScalar;
}

/// Nonces from the operating system's secure random generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsNonce;

impl NonceSource for OsNonce {
    fn nonce(&self) -> NonZeroScalar {
        NonZeroScalar::random(&mut OsRng)
    }
}

/// Always returns the same nonce.
///
/// Only useful for reproducible tests.
#[derive(Clone, Copy)]
pub struct FixedNonce(NonZeroScalar);

impl FixedNonce {
    /// Build from the big endian bytes of `k`.
    pub fn from_bytes(k: &[u8; 32]) -> Result<Self> {
        let k: Option<NonZeroScalar> = NonZeroScalar::from_repr(FieldBytes::clone_from_slice(k)).into();
        k.map(FixedNonce)
            .ok_or_else(|| Error::config_invalid("nonce must be in [1, n-1]"))
    }
}

impl Debug for FixedNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FixedNonce")
    }
}

impl NonceSource for FixedNonce {
    fn nonce(&self) -> NonZeroScalar {
        self.0
    }
}

/// Sign `message` and return the hex encoded DER signature.
pub fn sign(pair: &DerivedKeyPair, message: &[u8], nonce: &dyn NonceSource) -> Result<String> {
    sign_digest(pair, &sha256(message), nonce)
}

/// Sign a SHA-256 digest and return the hex encoded DER signature.
///
/// The signature is randomized: every call draws a new `k` from `nonce`, so
/// two signatures of the same digest differ unless the source repeats.
pub fn sign_digest(pair: &DerivedKeyPair, digest: &[u8], nonce: &dyn NonceSource) -> Result<String> {
    if digest.len() != 32 {
        return Err(Error::signing_failure(format!(
            "digest must be 32 bytes, got {}",
            digest.len()
        )));
    }

    let z = FieldBytes::from_slice(digest);
    let d: &Scalar = pair.secret_scalar();

    for _ in 0..MAX_SIGNING_ATTEMPTS {
        let k = nonce.nonce();
        // Fails only when r or s comes out zero, a fresh nonce fixes that.
        match <Scalar as SignPrimitive<NistP256>>::try_sign_prehashed(d, *k, z) {
            Ok((signature, _)) => return Ok(hex::encode(signature.to_der().as_bytes())),
            Err(e) => debug!("degenerate signature, drawing a new nonce: {e}"),
        }
    }

    Err(Error::signing_failure(
        "nonce source kept producing degenerate signatures",
    ))
}

/// Check a hex encoded DER signature of `message` against `public`.
///
/// Malformed signatures are reported as not matching.
pub fn verify(public: &PublicKey, message: &[u8], signature_hex: &str) -> bool {
    let Ok(der) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return false;
    };

    VerifyingKey::from(public)
        .verify_prehash(&sha256(message), &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::derive_key_pair;
    use p256::elliptic_curve::bigint::U256;
    use p256::elliptic_curve::ops::Reduce;
    use p256::elliptic_curve::PrimeField;
    use sigv4a_core::ErrorKind;

    fn pair() -> DerivedKeyPair {
        derive_key_pair("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY").unwrap()
    }

    fn one() -> FixedNonce {
        let mut k = [0u8; 32];
        k[31] = 1;
        FixedNonce::from_bytes(&k).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let pair = pair();
        let sig = sign(&pair, b"hello, world", &OsNonce).unwrap();

        assert!(verify(pair.public_key(), b"hello, world", &sig));
        assert!(!verify(pair.public_key(), b"hello, world!", &sig));
    }

    #[test]
    fn test_signatures_are_randomized() {
        let pair = pair();
        let a = sign(&pair, b"payload", &OsNonce).unwrap();
        let b = sign(&pair, b"payload", &OsNonce).unwrap();

        assert_ne!(a, b);
        assert!(verify(pair.public_key(), b"payload", &a));
        assert!(verify(pair.public_key(), b"payload", &b));
    }

    #[test]
    fn test_fixed_nonce_is_reproducible() {
        let pair = pair();
        let a = sign(&pair, b"payload", &one()).unwrap();
        let b = sign(&pair, b"payload", &one()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nonce_one_yields_generator_x() {
        let sig = sign(&pair(), b"payload", &one()).unwrap();
        let sig = Signature::from_der(&hex::decode(sig).unwrap()).unwrap();

        assert_eq!(
            hex::encode(sig.r().to_repr()),
            "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
        );
    }

    #[test]
    fn test_nonce_one_matches_textbook_ecdsa() {
        let pair = pair();
        let digest = sha256(b"payload");
        let sig = sign_digest(&pair, &digest, &one()).unwrap();
        let sig = Signature::from_der(&hex::decode(sig).unwrap()).unwrap();

        // With k = 1, s = z + r * d.
        let z = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(&digest));
        let r: Scalar = *sig.r();
        let d: Scalar = **pair.secret_scalar();
        assert_eq!(sig.s().to_repr(), (z + r * d).to_repr());
    }

    #[test]
    fn test_bad_digest_length() {
        let err = sign_digest(&pair(), b"too short", &OsNonce).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningFailure);
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let pair = pair();
        assert!(!verify(pair.public_key(), b"payload", "not-hex"));
        assert!(!verify(pair.public_key(), b"payload", "3045"));
    }

    #[test]
    fn test_zero_nonce_is_rejected() {
        let err = FixedNonce::from_bytes(&[0u8; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
