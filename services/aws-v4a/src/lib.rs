//! Region-set scoped request signing with ECDSA P-256.
//!
//! Requests are signed with a key pair derived from the caller's secret
//! access key. One signature can cover many regions, or every region with
//! the `*` region set.
//!
//! ## Example
//!
//! ```no_run
//! use sigv4a::{DefaultCredentialProvider, RegionSet, RequestSigner, SigningConfig};
//! use sigv4a_core::{Context, OsEnv, SignableBody, Signer};
//!
//! # async fn example() -> sigv4a_core::Result<()> {
//! let ctx = Context::new().with_env(OsEnv);
//! let signer = Signer::new(ctx, DefaultCredentialProvider::new(), RequestSigner::new());
//!
//! let config = SigningConfig::new("s3", RegionSet::new(["us-east-1", "us-west-2"])?);
//! let (parts, _) = http::Request::get("https://bucket.s3.amazonaws.com/key")
//!     .body(())
//!     .expect("request must be valid")
//!     .into_parts();
//!
//! let signed = signer.sign(&parts, SignableBody::empty(), &config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Streaming uploads use [`RequestSigner::sign`] directly to get hold of the
//! [`ChunkSigner`] seeded with the request signature.

mod constants;

mod credential;
pub use credential::Credential;

mod config;
pub use config::{PayloadSigning, SigningConfig};

mod scope;
pub use scope::{RegionSet, Scope};

mod canonical;
pub use canonical::CanonicalRequest;

mod string_to_sign;

pub mod ecdsa;
pub mod key;

mod sign_request;
pub use sign_request::{RequestSigner, SignedRequest};

mod chunk;
pub use chunk::{signed_content_length, ChunkSigner};

mod verify;
pub use verify::{verify_chunk, verify_request, verify_trailer};

mod provide_credential;
pub use provide_credential::*;
