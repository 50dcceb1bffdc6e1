//! Core components for signing API requests.
//!
//! This crate provides the foundational types and traits used by the
//! `sigv4a` signing engine. It is deliberately free of any protocol detail:
//! the algorithm, canonicalization rules and key handling live in the
//! service crate.
//!
//! ## Overview
//!
//! - **Context**: carries the environment and the clock. Signing code asks
//!   the context for time and never reads the system clock itself.
//! - **Traits**: [`ProvideCredential`] to load credentials and
//!   [`SignRequest`] to turn a borrowed request into a signed copy.
//! - **Signer**: the orchestrator that caches credentials and dispatches to
//!   a [`SignRequest`] implementation with a per-call configuration.
//!
//! ## Example
//!
//! ```no_run
//! use sigv4a_core::{Context, ProvideCredential, Result, SignRequest, SignableBody, Signer};
//! use sigv4a_core::{SigningCredential, SigningRequest};
//! use sigv4a_core::time::DateTime;
//! use async_trait::async_trait;
//! use http::request::Parts;
//!
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     key: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self, _: DateTime) -> bool {
//!         !self.key.is_empty()
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyLoader;
//!
//! #[async_trait]
//! impl ProvideCredential for MyLoader {
//!     type Credential = MyCredential;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
//!         Ok(Some(MyCredential { key: "my-access-key".to_string() }))
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyBuilder;
//!
//! impl SignRequest for MyBuilder {
//!     type Credential = MyCredential;
//!     type Config = ();
//!
//!     fn sign_request(
//!         &self,
//!         _: &Context,
//!         req: &Parts,
//!         _: SignableBody<'_>,
//!         cred: &MyCredential,
//!         _: &(),
//!     ) -> Result<Parts> {
//!         let mut signed = SigningRequest::build(req)?;
//!         signed.headers.insert("x-key", cred.key.parse()?);
//!         signed.into_parts(req.version)
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let signer = Signer::new(Context::new(), MyLoader, MyBuilder);
//!
//! let (parts, _) = http::Request::builder()
//!     .method("GET")
//!     .uri("https://example.com")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! let signed = signer.sign(&parts, SignableBody::empty(), &()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: SHA256 and HMAC helpers
//! - [`time`]: timestamp formatting and the [`time::Clock`] abstraction
//! - [`utils`]: redaction of secrets in logs

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, NoopEnv, OsEnv, StaticEnv};

mod error;
pub use error::{Error, ErrorKind, Result};

mod api;
pub use api::{ProvideCredential, ProvideCredentialChain, SignRequest, SigningCredential};
mod request;
pub use request::{ReadSeek, SignableBody, SigningMethod, SigningRequest};
mod signer;
pub use signer::Signer;
