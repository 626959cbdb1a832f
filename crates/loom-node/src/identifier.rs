//! Identifier validation for registered names.

use unicode_xid::UnicodeXID;

/// Whether `name` is usable as a registered name.
///
/// The first character must be `_` or XID_Start; every following character
/// must be XID_Continue. The empty string is never valid.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_xid_start() => {}
        _ => return false,
    }
    chars.all(|c| c.is_xid_continue())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("x"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("button2"));
        assert!(is_valid_identifier("größe"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("dash-ed"));
        assert!(!is_valid_identifier("dot.ted"));
    }
}
