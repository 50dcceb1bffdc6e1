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

use crate::{
    Context, Error, ProvideCredential, Result, SignRequest, SignableBody, SigningCredential,
};
use http::request::Parts;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Signer is the main struct used to sign the request.
///
/// It pulls credentials from the provider when the cached one is missing or
/// expired, and hands the actual signing to the builder. The signing
/// configuration is passed on every call, a `Signer` carries no per-request
/// state.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential, C: Debug + Send + Sync + 'static> {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = K>>,
    builder: Arc<dyn SignRequest<Credential = K, Config = C>>,
    credential: Arc<Mutex<Option<K>>>,
}

impl<K: SigningCredential, C: Debug + Send + Sync + 'static> Signer<K, C> {
    /// Create a new signer.
    pub fn new(
        ctx: Context,
        loader: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K, Config = C>,
    ) -> Self {
        Self {
            ctx,

            loader: Arc::new(loader),
            builder: Arc::new(builder),
            credential: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the context used by this signer.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Get a valid credential, loading a fresh one if needed.
    ///
    /// Fails with `MissingCredentials` if the provider has nothing to offer.
    /// No retry is attempted.
    pub async fn credential(&self) -> Result<K> {
        let now = self.ctx.now();
        let cached = self.cached();
        if let Some(cred) = cached.filter(|c| c.is_valid(now)) {
            return Ok(cred);
        }

        let loaded = self.loader.provide_credential(&self.ctx).await?;
        let Some(cred) = loaded.filter(|c| c.is_valid(now)) else {
            return Err(Error::missing_credentials(
                "no valid credential could be loaded from provider",
            ));
        };

        *self
            .credential
            .lock()
            .map_err(|_| Error::unexpected("credential cache lock poisoned"))? = Some(cred.clone());
        Ok(cred)
    }

    /// Sign the request and return the signed copy.
    pub async fn sign(&self, req: &Parts, body: SignableBody<'_>, config: &C) -> Result<Parts> {
        let cred = self.credential().await?;
        self.builder
            .sign_request(&self.ctx, req, body, &cred, config)
    }

    fn cached(&self) -> Option<K> {
        self.credential
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
    }
}
