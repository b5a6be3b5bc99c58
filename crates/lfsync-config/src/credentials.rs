// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Credential sources and the run-scoped credential holder.
//!
//! The token is resolved once per run into a [`CredentialScope`]. Both the
//! HTTP transfer layer and the git backend read it through the
//! [`CredentialProvider`] trait. Every copy handed out is a [`SecretString`],
//! so it is zeroed when dropped and redacted in `Debug` output.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::AuthConfig;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::debug;
use zeroize::Zeroizing;

/// Supplies a bearer token to network collaborators
pub trait CredentialProvider: Send + Sync {
    /// Current token, if any
    fn bearer_token(&self) -> Option<SecretString>;

    /// Whether a token is configured
    fn has_credential(&self) -> bool {
        self.bearer_token().is_some()
    }
}

/// Anonymous access
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredential;

impl CredentialProvider for NoCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        None
    }
}

/// Where a token comes from
#[derive(Debug)]
pub enum CredentialSource {
    /// No token
    Anonymous,
    /// Literal token
    Token(SecretString),
    /// First line of a file
    File(PathBuf),
    /// Environment variable
    Env(String),
}

impl CredentialSource {
    /// Literal token source
    pub fn token(token: impl Into<String>) -> Self {
        CredentialSource::Token(SecretString::new(token.into()))
    }

    /// Pick the highest-precedence source configured in `auth`
    pub fn from_config(auth: &AuthConfig) -> Self {
        if let Some(token) = &auth.token {
            CredentialSource::token(token.as_str())
        } else if let Some(path) = &auth.token_file {
            CredentialSource::File(path.clone())
        } else if let Some(var) = &auth.token_env {
            CredentialSource::Env(var.clone())
        } else {
            CredentialSource::Anonymous
        }
    }

    fn describe(&self) -> String {
        match self {
            CredentialSource::Anonymous => "anonymous".to_string(),
            CredentialSource::Token(_) => "literal token".to_string(),
            CredentialSource::File(path) => path.display().to_string(),
            CredentialSource::Env(var) => var.clone(),
        }
    }

    fn resolve(&self) -> ConfigResult<Option<SecretString>> {
        let raw: Zeroizing<String> = match self {
            CredentialSource::Anonymous => return Ok(None),
            CredentialSource::Token(token) => Zeroizing::new(token.expose_secret().clone()),
            CredentialSource::File(path) => {
                let content = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::credential_unavailable(path.display().to_string(), e.to_string())
                })?);
                Zeroizing::new(content.lines().next().unwrap_or_default().to_string())
            }
            CredentialSource::Env(var) => Zeroizing::new(
                std::env::var(var)
                    .map_err(|e| ConfigError::credential_unavailable(var.clone(), e.to_string()))?,
            ),
        };

        let token = raw.trim();
        if token.is_empty() {
            return Err(ConfigError::credential_unavailable(
                self.describe(),
                "token is empty",
            ));
        }
        Ok(Some(SecretString::new(token.to_string())))
    }
}

/// Token held for the duration of a run
///
/// Cloning the `Arc` shares the same secret; [`CredentialScope::release`]
/// (or the final drop) zeroes it for every holder.
#[derive(Debug)]
pub struct CredentialScope {
    secret: RwLock<Option<SecretString>>,
}

impl CredentialScope {
    /// Resolve `source` and hold the result
    pub fn acquire(source: &CredentialSource) -> ConfigResult<Arc<Self>> {
        let secret = source.resolve()?;
        debug!(source = %source.describe(), authenticated = secret.is_some(), "Credential acquired");
        Ok(Arc::new(Self {
            secret: RwLock::new(secret),
        }))
    }

    /// Scope without a token
    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self {
            secret: RwLock::new(None),
        })
    }

    /// Drop the held token; later lookups see no credential
    pub fn release(&self) {
        let mut guard = match self.secret.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!("Credential released");
        }
    }
}

impl CredentialProvider for CredentialScope {
    fn bearer_token(&self) -> Option<SecretString> {
        let guard = match self.secret.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map(|secret| SecretString::new(secret.expose_secret().clone()))
    }

    fn has_credential(&self) -> bool {
        match self.secret.read() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

impl Drop for CredentialScope {
    fn drop(&mut self) {
        self.release();
    }
}
