/// Accept `/`-rooted paths and absolute http(s) URLs.
pub fn parse_public_path(s: &str) -> Result<String, String> {
    const URL_PREFIXES: &[&str] = &["https://", "http://", "//"];

    if s.starts_with('/') || URL_PREFIXES.iter().any(|p| s.starts_with(p)) {
        return Ok(s.to_string());
    }
    Err(format!("'{s}' is not a public path. Use a path starting with '/' or an absolute URL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_paths_and_urls() {
        for ok in ["/", "/app/", "https://cdn.example.com/app", "//cdn.example.com/"] {
            assert_eq!(parse_public_path(ok).as_deref(), Ok(ok));
        }
    }

    #[test]
    fn rejects_relative_values() {
        assert!(parse_public_path("static/").is_err());
        assert!(parse_public_path("").is_err());
        assert!(parse_public_path("ftp://host/").is_err());
    }
}
