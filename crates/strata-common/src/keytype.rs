//! Key type tags recorded in segment metadata.

use serde::{Deserialize, Serialize};

/// Logical type of the keys stored in a segment.
///
/// Keys are always stored and compared as byte strings; this tag is pure
/// metadata carried in the segment footer so a reopened segment reports how
/// its keys were encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyType {
    /// Opaque byte strings.
    Bytes = 0,
    /// Big-endian unsigned 64-bit integers.
    U64 = 1,
    /// Order-preserving encoded signed 64-bit integers.
    I64 = 2,
    /// UTF-8 strings.
    Utf8 = 3,
}

impl KeyType {
    /// Returns the stable on-disk tag for this key type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a key type from its on-disk tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(KeyType::Bytes),
            1 => Some(KeyType::U64),
            2 => Some(KeyType::I64),
            3 => Some(KeyType::Utf8),
            _ => None,
        }
    }
}

impl Default for KeyType {
    fn default() -> Self {
        KeyType::Bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_tags_are_stable() {
        assert_eq!(KeyType::Bytes.as_u8(), 0);
        assert_eq!(KeyType::U64.as_u8(), 1);
        assert_eq!(KeyType::I64.as_u8(), 2);
        assert_eq!(KeyType::Utf8.as_u8(), 3);
    }

    #[test]
    fn test_key_type_roundtrip() {
        for kt in [KeyType::Bytes, KeyType::U64, KeyType::I64, KeyType::Utf8] {
            assert_eq!(KeyType::from_u8(kt.as_u8()), Some(kt));
        }
    }

    #[test]
    fn test_key_type_rejects_unknown_tag() {
        assert_eq!(KeyType::from_u8(4), None);
        assert_eq!(KeyType::from_u8(255), None);
    }

    #[test]
    fn test_key_type_default() {
        assert_eq!(KeyType::default(), KeyType::Bytes);
    }
}
