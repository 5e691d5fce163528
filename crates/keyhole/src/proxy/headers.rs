//! Header policy for both legs of a forwarded request
//!
//! Outbound: nothing is copied from the caller. The upstream receives a fixed
//! `Content-Type: application/json` and the injected `Authorization` header.
//!
//! Inbound (relayed response): every upstream header passes through in order,
//! duplicates included, except hop-by-hop headers and any header the upstream
//! listed in its own `Connection` header.

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE},
};

use super::credential::Credential;

/// Hop-by-hop headers that are never relayed across the gateway
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Content type sent upstream regardless of what the caller declared
pub const FORWARDED_CONTENT_TYPE: &str = "application/json";

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// An ordered header multimap.
///
/// Names compare case-insensitively (`HeaderName` is stored lowercase),
/// repeated names are kept as separate entries, and iteration follows
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayHeaders {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl RelayHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    /// First value for `name`, if any
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// All values for `name`, in insertion order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&HeaderName, &HeaderValue) -> bool,
    {
        self.entries.retain(|(n, v)| keep(n, v));
    }

    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        Self { entries }
    }

    /// Convert into a `HeaderMap`, appending so duplicates survive
    pub fn into_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in self.entries {
            map.append(name, value);
        }
        map
    }
}

/// Headers attached to every forwarded request
pub fn outbound_headers(credential: &Credential) -> RelayHeaders {
    let mut headers = RelayHeaders::new();
    headers.append(
        CONTENT_TYPE,
        HeaderValue::from_static(FORWARDED_CONTENT_TYPE),
    );
    headers.append(AUTHORIZATION, credential.authorization());
    headers
}

/// Upstream response headers that are safe to hand back to the caller
pub fn relayed_response_headers(upstream: &HeaderMap) -> RelayHeaders {
    let connection_listed: Vec<String> = upstream
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut headers = RelayHeaders::from_header_map(upstream);
    headers.retain(|name, _| {
        let name = name.as_str();
        !is_hop_by_hop(name) && !connection_listed.iter().any(|listed| listed == name)
    });
    headers
}
