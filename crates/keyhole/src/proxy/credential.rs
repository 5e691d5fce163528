//! The upstream bearer credential
//!
//! The secret is read once at startup from the environment variable named in
//! the config. It never implements a revealing `Debug`/`Display`, and the
//! header value built from it is flagged sensitive so HTTP tooling skips it.

use axum::http::HeaderValue;
use std::fmt;

use crate::error::{KeyholeError, Result};

#[derive(Clone)]
pub struct Credential {
    header: HeaderValue,
}

impl Credential {
    /// Build a credential from a raw API key
    pub fn new(api_key: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(KeyholeError::Credential(
                "upstream credential is empty".to_string(),
            ));
        }

        let mut header = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            KeyholeError::Credential(
                "upstream credential contains characters not allowed in an HTTP header"
                    .to_string(),
            )
        })?;
        header.set_sensitive(true);

        Ok(Self { header })
    }

    /// Read the credential from the named environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_lookup(var, |key| std::env::var(key).ok())
    }

    /// Read the credential through an arbitrary lookup. Errors name the
    /// variable, never a value.
    pub fn from_lookup<F>(var: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = lookup(var).ok_or_else(|| {
            KeyholeError::Credential(format!("environment variable {var} is not set"))
        })?;

        Self::new(&value).map_err(|e| match e {
            KeyholeError::Credential(reason) => {
                KeyholeError::Credential(format!("{var}: {reason}"))
            }
            other => other,
        })
    }

    /// The `Authorization` header value (`Bearer <key>`)
    pub fn authorization(&self) -> HeaderValue {
        self.header.clone()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
