//! Request classification: decides whether a path is forwarded upstream
//! or answered locally.

use url::Url;

/// Body of the static bypass response
pub const BYPASS_BODY: &str = "OK";

/// Outcome of classifying an inbound request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Relay the request to the configured upstream
    Forward,
    /// Answer locally with the static bypass response
    Bypass,
}

/// Placeholder authority used only to run paths through the URL parser
const NORMALIZE_BASE: &str = "http://keyhole.invalid";

/// Resolve `.` and `..` segments (including `%2e` spellings) the way the
/// outbound URL parser does.
///
/// Classification and forwarding both use this path, so a request can only
/// reach the upstream with a path that still carries the prefix. Returns
/// `None` for request targets that are not absolute paths.
pub fn normalize_path(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }
    let url = Url::parse(&format!("{NORMALIZE_BASE}{path}")).ok()?;
    Some(url.path().to_string())
}

/// Classify a request path against the forwarding prefix.
///
/// Matching is a case-sensitive prefix test. A path equal to the prefix
/// matches; an empty path never matches a non-empty prefix.
pub fn classify(path: &str, prefix: &str) -> Route {
    if path.starts_with(prefix) {
        Route::Forward
    } else {
        Route::Bypass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_under_prefix() {
        assert_eq!(classify("/v1/chat/completions", "/v1/"), Route::Forward);
        assert_eq!(classify("/v1/models", "/v1/"), Route::Forward);
    }

    #[test]
    fn test_exact_prefix_matches() {
        assert_eq!(classify("/v1/", "/v1/"), Route::Forward);
    }

    #[test]
    fn test_bypass_outside_prefix() {
        assert_eq!(classify("/", "/v1/"), Route::Bypass);
        assert_eq!(classify("/health", "/v1/"), Route::Bypass);
        assert_eq!(classify("/v2/chat", "/v1/"), Route::Bypass);
    }

    #[test]
    fn test_prefix_without_trailing_slash_does_not_match() {
        assert_eq!(classify("/v1", "/v1/"), Route::Bypass);
        assert_eq!(classify("/v1beta/models", "/v1/"), Route::Bypass);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert_eq!(classify("/V1/chat/completions", "/v1/"), Route::Bypass);
    }

    #[test]
    fn test_empty_path_bypasses() {
        assert_eq!(classify("", "/v1/"), Route::Bypass);
    }

    #[test]
    fn test_normalize_resolves_dot_segments() {
        assert_eq!(normalize_path("/v1/../admin/keys").unwrap(), "/admin/keys");
        assert_eq!(normalize_path("/v1/%2e%2e/admin/keys").unwrap(), "/admin/keys");
        assert_eq!(normalize_path("/v1/%2E%2E/admin").unwrap(), "/admin");
        assert_eq!(normalize_path("/v1/./models").unwrap(), "/v1/models");
        assert_eq!(normalize_path("/v1/a/../models").unwrap(), "/v1/models");
    }

    #[test]
    fn test_normalize_keeps_ordinary_paths() {
        assert_eq!(
            normalize_path("/v1/chat/completions").unwrap(),
            "/v1/chat/completions"
        );
        assert_eq!(
            normalize_path("/v1/files/file%20one").unwrap(),
            "/v1/files/file%20one"
        );
        assert_eq!(normalize_path("/").unwrap(), "/");
    }

    #[test]
    fn test_normalize_rejects_non_absolute_targets() {
        assert!(normalize_path("").is_none());
        assert!(normalize_path("*").is_none());
    }

    #[test]
    fn test_escaped_prefix_bypasses_after_normalizing() {
        let path = normalize_path("/v1/../admin/keys").unwrap();
        assert_eq!(classify(&path, "/v1/"), Route::Bypass);
    }

    #[test]
    fn test_prefix_must_lead() {
        assert_eq!(classify("/proxy/v1/chat", "/v1/"), Route::Bypass);
    }
}
