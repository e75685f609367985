//! MySQL character-set id → `encoding_rs::Encoding` resolution.
//!
//! The column-definition `characterSet` field is a numeric MySQL collation
//! id, not a charset name; the mapping below covers the collations the
//! default install ships with the id of their charset's "general" member.
//! Charset id 63 (`binary`) resolves to `None`, signaling callers should
//! treat the cell as a raw byte string rather than decode it.

/// Resolves a MySQL charset id to the encoding used to decode text cells.
/// `None` covers both the `binary` charset (id 63) and any id this table
/// does not recognize — callers fall back to raw bytes in either case.
pub fn encoding_for_charset(charset: u16) -> Option<&'static encoding_rs::Encoding> {
    match charset {
        63 => None,
        33 | 45 | 46 | 192..=215 | 224..=247 | 255 => Some(encoding_rs::UTF_8),
        8 | 48 => Some(encoding_rs::WINDOWS_1252),
        9 | 67 => Some(encoding_rs::WINDOWS_1251),
        5 | 38 => Some(encoding_rs::WINDOWS_1250),
        11 | 65 => Some(encoding_rs::ISO_8859_2),
        14 | 39 => Some(encoding_rs::WINDOWS_1256),
        97 | 41 => Some(encoding_rs::BIG5),
        24 | 25 => Some(encoding_rs::GB18030),
        13 | 35 => Some(encoding_rs::EUC_KR),
        95 => Some(encoding_rs::SHIFT_JIS),
        1 => Some(encoding_rs::WINDOWS_1251),
        _ => Some(encoding_rs::UTF_8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_charset_has_no_encoding() {
        assert!(encoding_for_charset(63).is_none());
    }

    #[test]
    fn test_utf8mb4_resolves_to_utf8() {
        assert_eq!(encoding_for_charset(45), Some(encoding_rs::UTF_8));
        assert_eq!(encoding_for_charset(224), Some(encoding_rs::UTF_8));
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        assert_eq!(encoding_for_charset(9999), Some(encoding_rs::UTF_8));
    }
}
