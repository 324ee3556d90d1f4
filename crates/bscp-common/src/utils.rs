//! Utility functions shared by the BSCP crates.

use std::sync::LazyLock;

use if_addrs::IfAddr;

/// Names of releases, strategies and config items.
static NAME_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new("^[a-zA-Z0-9_.\\-]{1,128}$").expect("Invalid regex pattern")
});

/// Content ids are lower or upper case hex sha256 digests.
static SHA256_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-fA-F0-9]{64}$").expect("Invalid regex pattern"));

/// Validate a resource name
///
/// # Examples
///
/// ```
/// use bscp_common::is_valid_name;
///
/// assert!(is_valid_name("server.yaml"));
/// assert!(!is_valid_name("with spaces"));
/// assert!(!is_valid_name(""));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Validate a content id (hex sha256)
pub fn is_sha256(id: &str) -> bool {
    SHA256_PATTERN.is_match(id)
}

/// Get the local IP address
///
/// Returns the first non-loopback IPv4 address found,
/// or "127.0.0.1" as fallback.
pub fn local_ip() -> String {
    if_addrs::get_if_addrs()
        .ok()
        .and_then(|addrs| {
            addrs
                .into_iter()
                .find(|iface| !iface.is_loopback() && matches!(iface.addr, IfAddr::V4(_)))
                .and_then(|iface| match iface.addr {
                    IfAddr::V4(addr) => Some(addr.ip.to_string()),
                    _ => None,
                })
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("v1.0.2"));
        assert!(is_valid_name("gray_release-01"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(&"x".repeat(129)));
    }

    #[test]
    fn test_is_sha256() {
        assert!(is_sha256(&"ab".repeat(32)));
        assert!(!is_sha256("abc"));
        assert!(!is_sha256(&"zz".repeat(32)));
    }

    #[test]
    fn test_local_ip_not_empty() {
        assert!(!local_ip().is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_hex_digests_are_content_ids(id in "[a-fA-F0-9]{64}") {
            proptest::prop_assert!(is_sha256(&id));
        }

        #[test]
        fn prop_names_never_contain_separators(name in "[a-z]{0,10}[/ :][a-z]{0,10}") {
            proptest::prop_assert!(!is_valid_name(&name));
        }
    }
}
