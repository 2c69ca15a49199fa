//! Redirect URI construction
//!
//! Incoming paths embed the original download URL, e.g.
//! `/single/https://downloads.sourceforge.net/projects/x/files/y/download`.
//! The origin host is dropped, the path is rewritten with the configured
//! rules and re-rooted on the selected mirror.

use regex::Regex;
use std::sync::OnceLock;

use crate::config::RedirectConfig;

fn origin_regex() -> &'static Regex {
    static ORIGIN_RE: OnceLock<Regex> = OnceLock::new();
    ORIGIN_RE.get_or_init(|| Regex::new(r"https?://([^/]+)/(.+)").expect("Invalid regex pattern"))
}

/// Split an embedded URL into origin host and path (without leading `/`)
pub fn extract_domain_and_path(uri: &str) -> Option<(&str, &str)> {
    let captures = origin_regex().captures(uri)?;
    let domain = captures.get(1)?.as_str();
    let path = captures.get(2)?.as_str();
    Some((domain, path))
}

/// Redirect target for `path` on `host`
pub fn build_redirect_uri(config: &RedirectConfig, host: &str, path: &str) -> String {
    let mut path = format!("/{path}");
    for rule in config.rewrites.iter().filter(|r| !r.from.is_empty()) {
        path = path.replacen(&rule.from, &rule.to, 1);
    }

    let mut uri = format!("{}://{}{}", config.scheme, host, path);
    if !config.query.is_empty() {
        uri.push('?');
        uri.push_str(&config.query);
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteRule;

    #[test]
    fn test_extract_domain_and_path() {
        let (domain, path) =
            extract_domain_and_path("https://downloads.sourceforge.net/projects/x/files/y.zip")
                .unwrap();
        assert_eq!(domain, "downloads.sourceforge.net");
        assert_eq!(path, "projects/x/files/y.zip");
    }

    #[test]
    fn test_extract_rejects_bare_path() {
        assert_eq!(extract_domain_and_path("projects/x/files/y.zip"), None);
        assert_eq!(extract_domain_and_path("https://only-host.example"), None);
    }

    #[test]
    fn test_build_redirect_uri_default_rules() {
        let uri = build_redirect_uri(
            &RedirectConfig::default(),
            "fast.example.com",
            "projects/sevenzip/files/7-Zip/23.01/7zr.exe/download",
        );
        assert_eq!(
            uri,
            "https://fast.example.com/project/sevenzip/7-Zip/23.01/7zr.exe?viasf=1"
        );
    }

    #[test]
    fn test_rewrites_apply_once() {
        let uri = build_redirect_uri(
            &RedirectConfig::default(),
            "m.test",
            "projects/a/files/b/files/c",
        );
        assert_eq!(uri, "https://m.test/project/a/b/files/c?viasf=1");
    }

    #[test]
    fn test_no_query_no_rules() {
        let config = RedirectConfig {
            scheme: "http".to_string(),
            query: String::new(),
            rewrites: vec![RewriteRule::new("", "ignored")],
        };
        assert_eq!(build_redirect_uri(&config, "m.test", "a/b"), "http://m.test/a/b");
    }
}
