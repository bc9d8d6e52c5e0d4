//! NL Interpreter (C2): maps a natural-language phrase to a canonical
//! provider command via a per-provider dictionary.
//!
//! Implemented as an ordered mapping (insertion order preserved), iterated
//! longest-key-first. A trie would be faster but isn't earned at this
//! dictionary size.

/// An ordered phrase -> command dictionary. Insertion order is preserved so
/// that ties in key length resolve to "first declared wins".
pub struct PhraseDictionary {
    entries: Vec<(&'static str, &'static str)>,
}

impl PhraseDictionary {
    pub fn new(entries: &[(&'static str, &'static str)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    /// Looks up the longest dictionary key that is a substring of the
    /// lowercased, whitespace-collapsed `text`. Returns `None` when no
    /// phrase matches (C2 contract: `interpret` returning `Unknown`).
    pub fn interpret(&self, text: &str) -> Option<&'static str> {
        let normalized = normalize(text);

        let mut candidates: Vec<&(&'static str, &'static str)> = self
            .entries
            .iter()
            .filter(|(phrase, _)| normalized.contains(phrase))
            .collect();

        // Stable sort by descending key length keeps insertion order as the
        // tie-break for equal-length matches.
        candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        candidates.first().map(|(_, command)| *command)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn longest_phrase_wins() {
        let dict = PhraseDictionary::new(&[
            ("list", "short"),
            ("list my vms", "az vm list"),
            ("list my vm sizes", "az vm list-sizes"),
        ]);
        assert_eq!(dict.interpret("please list my vms now"), Some("az vm list"));
    }

    #[test]
    fn ties_resolve_to_declaration_order() {
        let dict = PhraseDictionary::new(&[("foo bar", "first"), ("bar baz", "second")]);
        // "foo bar baz" contains both 7-char phrases; first declared wins.
        assert_eq!(dict.interpret("foo bar baz"), Some("first"));
    }

    #[test]
    fn unknown_phrase_returns_none() {
        let dict = PhraseDictionary::new(&[("list my vms", "az vm list")]);
        assert_eq!(dict.interpret("launch the rocket"), None);
    }

    #[test]
    fn normalization_is_case_and_whitespace_insensitive() {
        let dict = PhraseDictionary::new(&[("list my vms", "az vm list")]);
        assert_eq!(
            dict.interpret("  LIST   MY    VMS  please"),
            Some("az vm list")
        );
    }
}
