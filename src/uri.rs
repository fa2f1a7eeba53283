//! Bidirectional URI translation.
//!
//! Absolute URIs in cover-site content are rewritten to opaque local paths
//! so that every resource the client fetches goes back through the proxy.
//! `"<scheme>://<host>/<path>"` becomes `"/&<scheme>/<host>/<path>"`; the
//! request side applies the inverse mapping before contacting the cover
//! origin.

/// Translate an absolute URI to its local form.
///
/// Inputs without a `://` separator are returned unchanged.
pub fn localize(uri: &str) -> String {
    match uri.find("://") {
        Some(pos) => {
            // skip the colon and one slash; the remainder keeps its
            // leading "/" so host and path stay "/"-separated
            format!("/&{}{}", &uri[..pos], &uri[pos + 2..])
        }
        None => uri.to_string(),
    }
}

/// Translate a local path back to its absolute form.
///
/// Only paths of the form `/&<scheme>/<rest>` are rewritten; a missing or
/// empty scheme leaves the input unchanged.
pub fn delocalize(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("/&") {
        if let Some(pos) = rest.find('/') {
            if pos > 0 {
                return format!("{}:/{}", &rest[..pos], &rest[pos..]);
            }
        }
    }
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_absolute() {
        assert_eq!(localize("http://example.com/a.png"), "/&http/example.com/a.png");
        assert_eq!(localize("https://x/y.css"), "/&https/x/y.css");
    }

    #[test]
    fn test_localize_local_is_noop() {
        assert_eq!(localize("/images/logo.gif"), "/images/logo.gif");
        assert_eq!(localize("style.css"), "style.css");
    }

    #[test]
    fn test_delocalize_translated() {
        assert_eq!(delocalize("/&http/example.com/a.png"), "http://example.com/a.png");
        assert_eq!(delocalize("/&https/x/y.css"), "https://x/y.css");
    }

    #[test]
    fn test_delocalize_plain_is_noop() {
        assert_eq!(delocalize("/a.png"), "/a.png");
        assert_eq!(delocalize("/upload/B1"), "/upload/B1");
    }

    #[test]
    fn test_round_trip() {
        for uri in [
            "http://example.com/a.png",
            "https://cdn.host.net/deep/path/file.js?v=2",
            "http://x/",
        ] {
            assert_eq!(delocalize(&localize(uri)), uri);
        }
        for path in ["/plain", "relative.gif", "/"] {
            assert_eq!(localize(path), path);
            assert_eq!(delocalize(path), path);
        }
    }

    #[test]
    fn test_degenerate_local_forms() {
        // empty scheme or missing slash: no translation
        assert_eq!(delocalize("/&/x"), "/&/x");
        assert_eq!(delocalize("/&http"), "/&http");
        assert_eq!(delocalize("/&"), "/&");
    }
}
