//! Credential model and the line-oriented credential source format.
//!
//! # Format
//!
//! ```text
//! # comment
//! 2580: Staff        <- code with label
//! 8246               <- bare code
//! 04A2B3C4: Badge 7  <- card UID (hexadecimal)
//! ```
//!
//! - Leading and trailing whitespace is trimmed from every line.
//! - Blank lines and lines starting with `#` are ignored.
//! - `code: label` splits on the first `:`; an empty label counts as no label.
//! - Malformed lines (empty code, whitespace inside the code) are skipped.
//! - Duplicate codes collapse into one entry; the last non-empty label wins.

use chrono::{DateTime, Utc};
use kiosklock_core::constants::{CREDENTIAL_COMMENT_PREFIX, CREDENTIAL_LABEL_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// A code authorized to unlock the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// PIN or card UID, exactly as written in the source.
    pub code: String,

    /// Informational label (e.g. the holder's name).
    pub label: Option<String>,
}

impl Credential {
    /// Create a credential without a label.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: None,
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Identity of one version of the credential source.
///
/// Captured from file metadata. The length is part of the token so that two
/// writes landing within the filesystem's timestamp granularity are still
/// told apart when they change the size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceToken {
    /// Last modification time reported by the filesystem.
    pub modified: SystemTime,

    /// File length in bytes.
    pub len: u64,
}

/// One generation of valid credentials.
///
/// A set is never mutated after it is built; every reload produces a new set
/// that replaces the previous one wholesale.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    entries: HashMap<String, Credential>,
    token: Option<SourceToken>,
    loaded_at: DateTime<Utc>,
}

impl CredentialSet {
    /// An empty set. Nothing unlocks against it.
    pub fn empty() -> Self {
        Self::from_entries(HashMap::new(), None)
    }

    pub(crate) fn from_entries(
        entries: HashMap<String, Credential>,
        token: Option<SourceToken>,
    ) -> Self {
        Self {
            entries,
            token,
            loaded_at: Utc::now(),
        }
    }

    /// Look up a code: exact match first, then its uppercase form.
    ///
    /// The uppercase fallback lets hexadecimal card UIDs match regardless of
    /// the casing a reader reports. Numeric PINs are unaffected by it.
    pub fn get(&self, code: &str) -> Option<&Credential> {
        self.entries
            .get(code)
            .or_else(|| self.entries.get(&code.to_uppercase()))
    }

    /// Returns `true` if `code` or its uppercase form is a member of this set.
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Label attached to `code`, if any.
    pub fn label(&self, code: &str) -> Option<&str> {
        self.get(code).and_then(|c| c.label.as_deref())
    }

    /// Number of distinct codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no codes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Token of the source version this set was parsed from.
    pub fn token(&self) -> Option<SourceToken> {
        self.token
    }

    /// Wall-clock time this generation was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl FromIterator<Credential> for CredentialSet {
    /// Build an in-memory set. Later duplicates replace earlier ones.
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        let entries = iter.into_iter().map(|c| (c.code.clone(), c)).collect();
        Self::from_entries(entries, None)
    }
}

/// Outcome of parsing a credential source.
#[derive(Debug, Clone, Default)]
pub struct ParsedCredentials {
    /// Credentials keyed by code.
    pub entries: HashMap<String, Credential>,

    /// 1-based line numbers of lines that were skipped as malformed.
    pub skipped_lines: Vec<usize>,
}

/// Parse the text of a credential source.
///
/// Never fails: malformed lines are reported in
/// [`ParsedCredentials::skipped_lines`] and otherwise ignored.
pub fn parse_credentials(text: &str) -> ParsedCredentials {
    let mut parsed = ParsedCredentials::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(CREDENTIAL_COMMENT_PREFIX) {
            continue;
        }

        let (code, label) = match line.split_once(CREDENTIAL_LABEL_SEPARATOR) {
            Some((code, label)) => (code.trim(), Some(label.trim()).filter(|l| !l.is_empty())),
            None => (line, None),
        };

        if code.is_empty() || code.chars().any(char::is_whitespace) {
            parsed.skipped_lines.push(index + 1);
            continue;
        }

        let entry = parsed
            .entries
            .entry(code.to_string())
            .or_insert_with(|| Credential::new(code));
        if let Some(label) = label {
            entry.label = Some(label.to_string());
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set_from(text: &str) -> CredentialSet {
        CredentialSet::from_entries(parse_credentials(text).entries, None)
    }

    #[test]
    fn test_code_with_label() {
        let set = set_from("1234: Alice\n");
        assert!(set.contains("1234"));
        assert_eq!(set.label("1234"), Some("Alice"));
    }

    #[test]
    fn test_bare_code_has_no_label() {
        let set = set_from("5678\n");
        assert!(set.contains("5678"));
        assert_eq!(set.label("5678"), None);
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let set = set_from("# header\n\n   \n  # indented comment\n2580\n");
        assert_eq!(set.len(), 1);
        assert!(set.contains("2580"));
        assert!(!set.contains("# header"));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let set = set_from("   2580   :   Staff Member   \r\n");
        assert_eq!(set.label("2580"), Some("Staff Member"));
    }

    #[rstest]
    #[case(": orphan label")]
    #[case("12 34")]
    #[case("12 34: split code")]
    fn test_malformed_lines_are_skipped(#[case] line: &str) {
        let parsed = parse_credentials(&format!("1111\n{line}\n2222\n"));
        assert_eq!(parsed.skipped_lines, vec![2]);
        assert_eq!(parsed.entries.len(), 2);
    }

    #[test]
    fn test_duplicate_codes_last_label_wins() {
        let set = set_from("1234: Alice\n1234: Bob\n1234\n");
        assert_eq!(set.len(), 1);
        assert_eq!(set.label("1234"), Some("Bob"));
    }

    #[test]
    fn test_empty_label_is_none() {
        let set = set_from("1234:\n");
        assert!(set.contains("1234"));
        assert_eq!(set.label("1234"), None);
    }

    #[test]
    fn test_label_may_contain_separator() {
        let set = set_from("1234: Night shift: door 2\n");
        assert_eq!(set.label("1234"), Some("Night shift: door 2"));
    }

    #[test]
    fn test_uppercase_fallback_for_card_uids() {
        let set = set_from("04A2B3C4: Badge\n");
        assert!(set.contains("04A2B3C4"));
        assert!(set.contains("04a2b3c4"));
        assert!(!set.contains("04A2B3C"));
    }

    #[test]
    fn test_lowercase_entry_requires_exact_match() {
        let set = set_from("04a2b3c4\n");
        assert!(set.contains("04a2b3c4"));
        assert!(!set.contains("04A2B3C4"));
    }

    #[test]
    fn test_collect_in_memory_set() {
        let set: CredentialSet = [Credential::new("1234"), Credential::new("5678").with_label("Bob")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.label("5678"), Some("Bob"));
        assert!(set.token().is_none());
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = CredentialSet::empty();
        assert!(set.is_empty());
        assert!(!set.contains(""));
        assert!(!set.contains("1234"));
    }
}
