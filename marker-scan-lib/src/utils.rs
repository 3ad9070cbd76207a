//! Utility functions for domain validation and URL construction.

use crate::error::ScanError;
use crate::types::Protocol;

/// Validate that a domain can be used as the host of a scan URL.
///
/// This is a basic syntactic check; anything DNS rejects later surfaces as a
/// network error on the target instead.
pub fn validate_domain(domain: &str) -> Result<(), ScanError> {
    if domain.is_empty() {
        return Err(ScanError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.len() > 253 {
        return Err(ScanError::invalid_domain(domain, "Domain name too long"));
    }

    if domain.contains("://") {
        return Err(ScanError::invalid_domain(
            domain,
            "Domain must not include a URL scheme",
        ));
    }

    if domain.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ScanError::invalid_domain(
            domain,
            "Domain contains whitespace or a path separator",
        ));
    }

    if domain.starts_with('.') || domain.starts_with('-') {
        return Err(ScanError::invalid_domain(
            domain,
            "Domain cannot start with '.' or '-'",
        ));
    }

    Ok(())
}

/// Build the URL fetched for `domain` over `protocol`.
///
/// Returns `None` for [`Protocol::None`].
pub fn build_url(protocol: Protocol, domain: &str) -> Option<String> {
    protocol
        .scheme()
        .map(|scheme| format!("{}://{}", scheme, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub.example.co.uk").is_ok());
        assert!(validate_domain("localhost:8080").is_ok());

        assert!(validate_domain("").is_err());
        assert!(validate_domain("http://example.com").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain("example.com/path").is_err());
        assert!(validate_domain(".example.com").is_err());
        assert!(validate_domain("-example.com").is_err());
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url(Protocol::Http, "example.com"),
            Some("http://example.com".to_string())
        );
        assert_eq!(
            build_url(Protocol::Https, "example.com"),
            Some("https://example.com".to_string())
        );
        assert_eq!(build_url(Protocol::None, "example.com"), None);
    }
}
