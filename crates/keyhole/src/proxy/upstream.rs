//! The fixed upstream origin and target URL construction

use crate::error::{KeyholeError, Result};
use url::Url;

/// A validated upstream origin that inbound paths are appended to
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamOrigin {
    /// Origin (plus optional base path) with no trailing slash
    base: String,
    /// Path component of `base`, empty for a bare origin
    base_path: String,
}

impl UpstreamOrigin {
    /// Parse and validate a configured origin such as `https://api.openai.com`.
    ///
    /// Only `http` and `https` are accepted. Embedded credentials, query
    /// strings and fragments are rejected so nothing besides the injected
    /// bearer token can ride along on forwarded requests. A base path is
    /// allowed and is kept in front of every forwarded path.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin.trim())
            .map_err(|e| KeyholeError::Config(format!("Invalid upstream origin '{origin}': {e}")))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(KeyholeError::Config(format!(
                "Unsupported upstream scheme '{scheme}': only http and https are allowed"
            )));
        }

        if url.host_str().is_none() {
            return Err(KeyholeError::Config(format!(
                "Upstream origin '{origin}' has no host"
            )));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(KeyholeError::Config(
                "Upstream origin must not embed credentials".to_string(),
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(KeyholeError::Config(format!(
                "Upstream origin '{origin}' must not carry a query or fragment"
            )));
        }

        let base = url.as_str().trim_end_matches('/').to_string();
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self { base, base_path })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Build the outbound URL: origin + inbound path, plus the inbound query
    /// when one is present and non-empty.
    ///
    /// The parsed URL must still be exactly origin + `path`; a path whose dot
    /// segments would climb out of it is rejected.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let mut target = format!("{}{}", self.base, path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(q);
        }

        let url = Url::parse(&target)
            .map_err(|e| KeyholeError::Proxy(format!("Invalid forwarded path '{path}': {e}")))?;

        if url.path() != format!("{}{}", self.base_path, path) {
            return Err(KeyholeError::Proxy(format!(
                "Forwarded path '{path}' does not resolve under the upstream origin"
            )));
        }

        Ok(url)
    }
}
