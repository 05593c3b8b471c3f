//! Credential pattern extraction
//!
//! Finds `local@domain.tld:secret` substrings in free text. Matching is the
//! usual leftmost, non-overlapping scan of a regular expression, so the output
//! keeps discovery order and duplicates. Deduplication belongs to the
//! collector.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static CREDENTIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b:\S+")
        .expect("credential regex must compile")
});

/// An extracted `identifier:secret` string, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw string without validating it
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Extract every credential-shaped substring from `text`
///
/// Absent text yields an empty vector.
pub fn extract(text: Option<&str>) -> Vec<Credential> {
    let Some(text) = text else {
        return Vec::new();
    };

    CREDENTIAL_RE
        .find_iter(text)
        .map(|m| Credential::new(m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(found: Vec<Credential>) -> Vec<String> {
        found.into_iter().map(Credential::into_inner).collect()
    }

    #[test]
    fn test_absent_text() {
        assert!(extract(None).is_empty());
    }

    #[test]
    fn test_no_credentials() {
        assert!(extract(Some("no credentials here")).is_empty());
        assert!(extract(Some("")).is_empty());
        assert!(extract(Some("mail me at someone@example.com")).is_empty());
    }

    #[test]
    fn test_duplicates_preserved() {
        let found = extract(Some("a@b.co:pw1 a@b.co:pw1"));
        assert_eq!(raw(found), vec!["a@b.co:pw1", "a@b.co:pw1"]);
    }

    #[test]
    fn test_secret_runs_to_whitespace() {
        let found = extract(Some("leak: john.doe+x@mail.example.org:Hunter2!@#\nnext line"));
        assert_eq!(raw(found), vec!["john.doe+x@mail.example.org:Hunter2!@#"]);
    }

    #[test]
    fn test_multiple_per_line_in_order() {
        let text = "first@one.net:aaa | second@two.io:bbb\nthird@three.com:ccc";
        assert_eq!(
            raw(extract(Some(text))),
            vec!["first@one.net:aaa", "second@two.io:bbb", "third@three.com:ccc"]
        );
    }

    #[test]
    fn test_tld_case_insensitive() {
        let found = extract(Some("USER@EXAMPLE.COM:Secret"));
        assert_eq!(raw(found), vec!["USER@EXAMPLE.COM:Secret"]);
    }

    #[test]
    fn test_tld_needs_two_letters() {
        assert!(extract(Some("x@host.c:pw")).is_empty());
        assert!(extract(Some("x@host.12:pw")).is_empty());
    }

    #[test]
    fn test_colon_requires_secret() {
        assert!(extract(Some("x@host.com: spaced")).is_empty());
        assert!(extract(Some("x@host.com:")).is_empty());
    }

    #[test]
    fn test_unicode_secret_kept_verbatim() {
        let found = extract(Some("u@site.ru:пароль123"));
        assert_eq!(raw(found), vec!["u@site.ru:пароль123"]);
    }

    proptest! {
        #[test]
        fn prop_extract_is_deterministic(text in ".{0,200}") {
            prop_assert_eq!(extract(Some(&text)), extract(Some(&text)));
        }

        #[test]
        fn prop_every_match_has_shape(text in "[a-z@.: \n]{0,120}") {
            for cred in extract(Some(&text)) {
                let s = cred.as_str();
                prop_assert!(s.contains('@'));
                prop_assert!(s.contains(':'));
                prop_assert!(!s.chars().any(char::is_whitespace));
            }
        }
    }
}
