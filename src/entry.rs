//! Raw directory entries
//!
//! A search result entry is a distinguished name plus a map from attribute
//! name to a sequence of values, where any value may arrive as text or as
//! raw bytes. All "first value / decode / default" logic for normalization
//! lives here so user and group conversion share one accessor instead of
//! re-implementing it per field.

use std::collections::HashMap;

use ldap3::SearchEntry;
use tracing::debug;

/// A raw `(dn, attributes)` entry as returned by the directory.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl RawEntry {
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }

    /// First value of a single-valued text attribute.
    ///
    /// Text values win; a value the server returned as bytes is decoded as
    /// UTF-8. Empty strings and undecodable bytes come back as `None` — a
    /// malformed value drops the field, never the record.
    pub fn first_text(&self, name: &str) -> Option<String> {
        if let Some(value) = self.attrs.get(name).and_then(|v| v.first()) {
            if value.is_empty() {
                return None;
            }
            return Some(value.clone());
        }

        let bytes = self.bin_attrs.get(name).and_then(|v| v.first())?;
        match std::str::from_utf8(bytes) {
            Ok("") => None,
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                debug!("Attribute {} of {} is not valid UTF-8; dropped", name, self.dn);
                None
            }
        }
    }

    /// All values of a multi-valued attribute, each decoded individually.
    /// An absent attribute yields an empty sequence, never a missing field.
    pub fn all_text(&self, name: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .attrs
            .get(name)
            .map(|v| v.iter().filter(|s| !s.is_empty()).cloned().collect())
            .unwrap_or_default();

        if let Some(bin_values) = self.bin_attrs.get(name) {
            for bytes in bin_values {
                match std::str::from_utf8(bytes) {
                    Ok("") => {}
                    Ok(s) => values.push(s.to_string()),
                    Err(_) => {
                        debug!("Skipping undecodable value of {} on {}", name, self.dn);
                    }
                }
            }
        }

        values
    }

    /// First value parsed as a signed integer.
    pub fn first_i64(&self, name: &str) -> Option<i64> {
        self.first_text(name).and_then(|v| v.parse().ok())
    }

    /// First value parsed as an unsigned 32-bit integer.
    pub fn first_u32(&self, name: &str) -> Option<u32> {
        self.first_text(name).and_then(|v| v.parse().ok())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::entry_with;
    use super::*;

    #[test]
    fn test_first_text_takes_first_value() {
        let entry = entry_with(
            "CN=Test",
            vec![("mail", vec!["a@example.com", "b@example.com"])],
            vec![],
        );
        assert_eq!(entry.first_text("mail").as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_first_text_empty_string_is_absent() {
        let entry = entry_with("CN=Test", vec![("department", vec![""])], vec![]);
        assert_eq!(entry.first_text("department"), None);
        assert_eq!(entry.first_text("missing"), None);
    }

    #[test]
    fn test_first_text_decodes_binary_utf8() {
        let entry = entry_with(
            "CN=Test",
            vec![],
            vec![("title", vec![b"Ingenieur".to_vec()])],
        );
        assert_eq!(entry.first_text("title").as_deref(), Some("Ingenieur"));
    }

    #[test]
    fn test_first_text_invalid_utf8_is_absent() {
        let entry = entry_with("CN=Test", vec![], vec![("title", vec![vec![0xff, 0xfe]])]);
        assert_eq!(entry.first_text("title"), None);
    }

    #[test]
    fn test_all_text_absent_is_empty() {
        let entry = entry_with("CN=Test", vec![], vec![]);
        assert!(entry.all_text("memberOf").is_empty());
    }

    #[test]
    fn test_all_text_merges_and_skips_bad_values() {
        let entry = entry_with(
            "CN=Test",
            vec![("memberOf", vec!["CN=A,DC=x", "CN=B,DC=x"])],
            vec![("memberOf", vec![b"CN=C,DC=x".to_vec(), vec![0xff]])],
        );
        assert_eq!(
            entry.all_text("memberOf"),
            vec!["CN=A,DC=x", "CN=B,DC=x", "CN=C,DC=x"]
        );
    }

    #[test]
    fn test_numeric_accessors() {
        let entry = entry_with(
            "CN=Test",
            vec![
                ("userAccountControl", vec!["514"]),
                ("groupType", vec!["-2147483643"]),
                ("junk", vec!["not-a-number"]),
            ],
            vec![],
        );
        assert_eq!(entry.first_u32("userAccountControl"), Some(514));
        assert_eq!(entry.first_i64("groupType"), Some(-2147483643));
        assert_eq!(entry.first_i64("junk"), None);
        assert_eq!(entry.first_u32("missing"), None);
    }
}
