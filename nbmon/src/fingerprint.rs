//! Configuration fingerprints.
//!
//! A fingerprint is the lower-case hex SHA-512 digest of the exact bytes of a
//! configuration. No normalization is applied: a trailing space is a change.
//! Fingerprint equality is the only change test nbmon performs.

use std::fmt;

use sha2::{Digest, Sha512};

/// Length in characters of a hex-encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 128;

/// Hex-encoded SHA-512 digest of a configuration text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed digest, e.g. one read back from the store.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a configuration text.
pub fn fingerprint(text: &str) -> Fingerprint {
    fingerprint_bytes(text.as_bytes())
}

/// Fingerprint raw configuration bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Sha512::digest(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let config = "hostname core1\ninterface Gi0/1\n description uplink\n";
        assert_eq!(fingerprint(config), fingerprint(config));
    }

    #[test]
    fn test_fixed_length_lower_hex() {
        for text in ["", "a", "hostname r1\n"] {
            let fp = fingerprint(text);
            assert_eq!(fp.as_str().len(), FINGERPRINT_LEN);
            assert!(
                fp.as_str()
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            );
        }
    }

    #[test]
    fn test_empty_text_known_digest() {
        assert_eq!(
            fingerprint("").as_str(),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn test_trailing_whitespace_is_a_change() {
        let base = "hostname r1\n";
        assert_ne!(fingerprint(base), fingerprint("hostname r1\n "));
        assert_ne!(fingerprint(base), fingerprint("hostname r1"));
        assert_ne!(fingerprint(base), fingerprint("hostname r1\r\n"));
    }

    #[test]
    fn test_single_character_edit_is_a_change() {
        assert_ne!(
            fingerprint("ip address 10.0.0.1 255.255.255.0"),
            fingerprint("ip address 10.0.0.2 255.255.255.0")
        );
        assert_ne!(fingerprint("Vlan10"), fingerprint("vlan10"));
    }

    #[test]
    fn test_bytes_and_text_agree() {
        assert_eq!(fingerprint("abc"), fingerprint_bytes(b"abc"));
    }
}
