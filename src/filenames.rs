//! Canonical note identifiers.
//!
//! Every note is addressed by a `NoteId`: a filesystem-safe string derived
//! from the note title. Two titles that canonicalize to the same string are
//! the same note for all link/index purposes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::{EngineError, Result};

const MAX_LEN: usize = 120;

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn is_windows_reserved(base: &str) -> bool {
    matches!(base, "con" | "prn" | "aux" | "nul")
        || (base.len() == 4
            && (base.starts_with("com") || base.starts_with("lpt"))
            && base[3..].chars().all(|c| c.is_ascii_digit() && c != '0'))
}

fn untitled() -> String {
    format!("Untitled-{}", &Uuid::new_v4().simple().to_string()[..6])
}

/// The sanitation pipeline. `None` means the title has no usable content
/// left after cleaning.
fn canonicalize(title: &str) -> Option<String> {
    let s: String = title.nfkc().collect();
    let s: String = s.chars().filter(|c| !c.is_control()).collect();
    let s = s.trim().replace('/', "-").replace('\\', "-");
    let s = UNSAFE_CHARS.replace_all(&s, "_");
    let s = WHITESPACE_RUN.replace_all(&s, " ");
    let mut s = s.trim().trim_end_matches([' ', '.']).to_string();

    if s.is_empty() {
        return None;
    }

    let base = s.split('.').next().unwrap_or("").trim().to_lowercase();
    if is_windows_reserved(&base) {
        s = format!("_{}", s);
    }

    if s.chars().count() > MAX_LEN {
        s = s.chars().take(MAX_LEN).collect();
        s = s.trim_end_matches([' ', '.']).to_string();
    }

    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Make a filesystem-safe note title (cross-platform).
///
/// Idempotent: `safe_filename(safe_filename(s)) == safe_filename(s)`.
/// A title that canonicalizes to nothing gets a generated `Untitled-xxxxxx`
/// token instead (fresh per call, but stable once produced).
pub fn safe_filename(title: &str) -> String {
    canonicalize(title).unwrap_or_else(untitled)
}

/// Canonical, filesystem-safe identifier for a note.
///
/// Construction always canonicalizes, so a `NoteId` held anywhere in the
/// engine is guaranteed to already be in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(title: &str) -> NoteId {
        NoteId(safe_filename(title))
    }

    /// Strict variant for user-supplied titles (note creation dialogs):
    /// a title that canonicalizes to nothing is rejected instead of
    /// receiving a generated fallback id.
    pub fn try_new(title: &str) -> Result<NoteId> {
        canonicalize(title)
            .map(NoteId)
            .ok_or_else(|| EngineError::InvalidIdentifier(title.to_string()))
    }

    /// Wrap a string that is already canonical (e.g. a file stem produced
    /// by this engine). Re-canonicalizes to keep the invariant cheap to trust.
    pub fn from_canonical(s: String) -> NoteId {
        if safe_filename(&s) == s {
            NoteId(s)
        } else {
            NoteId::new(&s)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive ordering used for every user-facing list
    /// (backlink panes, graph node order).
    pub fn cmp_ignore_case(a: &NoteId, b: &NoteId) -> Ordering {
        a.0.to_lowercase()
            .cmp(&b.0.to_lowercase())
            .then_with(|| a.0.cmp(&b.0))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(title: &str) -> NoteId {
        NoteId::new(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(safe_filename("Hello World"), "Hello World");
    }

    #[test]
    fn test_slashes_become_dashes() {
        assert_eq!(safe_filename("a/b\\c"), "a-b-c");
    }

    #[test]
    fn test_empty_gets_fallback() {
        assert!(safe_filename("   ").starts_with("Untitled-"));
        assert!(safe_filename("").starts_with("Untitled-"));
    }

    #[test]
    fn test_reserved_windows_names() {
        assert!(safe_filename("CON").starts_with('_'));
        assert!(safe_filename("com3").starts_with('_'));
        assert!(safe_filename("lpt9.md").starts_with('_'));
        // com0 / com10 are not reserved
        assert!(!safe_filename("com0").starts_with('_'));
        assert!(!safe_filename("com10").starts_with('_'));
    }

    #[test]
    fn test_unicode_normalization() {
        // precomposed vs combining accent
        assert_eq!(safe_filename("\u{e9}"), safe_filename("e\u{301}"));
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(safe_filename("a   b\t c"), "a b c");
    }

    #[test]
    fn test_trailing_dots_stripped() {
        assert_eq!(safe_filename("note..."), "note");
    }

    #[test]
    fn test_unsafe_chars_replaced() {
        assert_eq!(safe_filename("a<b>c:d"), "a_b_c_d");
    }

    #[test]
    fn test_long_title_truncated() {
        let long = "가".repeat(400);
        let out = safe_filename(&long);
        assert_eq!(out.chars().count(), 120);
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Hello World", "a/b", "  spaced   out  ", "CON", "", "x.", "가나다"] {
            let once = safe_filename(raw);
            assert_eq!(safe_filename(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_try_new_rejects_unusable_titles() {
        assert!(matches!(
            NoteId::try_new(""),
            Err(EngineError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            NoteId::try_new("   "),
            Err(EngineError::InvalidIdentifier(_))
        ));
        // control characters only
        assert!(matches!(
            NoteId::try_new("\u{7}\u{8}"),
            Err(EngineError::InvalidIdentifier(_))
        ));
        // dots strip to nothing
        assert!(matches!(
            NoteId::try_new("..."),
            Err(EngineError::InvalidIdentifier(_))
        ));

        assert_eq!(NoteId::try_new("My Note").unwrap(), NoteId::new("My Note"));
    }

    #[test]
    fn test_note_id_equality_is_canonical() {
        assert_eq!(NoteId::new("My  Note"), NoteId::new("My Note"));
        assert_eq!(NoteId::new("a/b"), NoteId::new("a-b"));
    }

    #[test]
    fn test_case_insensitive_ordering() {
        let mut ids = vec![NoteId::new("banana"), NoteId::new("Apple"), NoteId::new("cherry")];
        ids.sort_by(NoteId::cmp_ignore_case);
        let names: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(names, vec!["Apple", "banana", "cherry"]);
    }
}
