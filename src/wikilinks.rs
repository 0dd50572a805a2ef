//! Wikilink parsing, rewriting and rendering.
//!
//! Supported syntax:
//!   [[Note]]
//!   [[Note|Alias]]
//!   [[Note#Heading]]
//!   [[Note^block]]
//!
//! The heading/block suffix is never part of the note's identity. Malformed
//! spans (no closing brackets) are left untouched; empty inner content yields
//! no link. All functions here are pure and stateless.

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use std::cell::Cell;
use std::collections::HashSet;

use crate::filenames::{safe_filename, NoteId};

static WIKILINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

// Everything except RFC 3986 unreserved characters gets percent-encoded.
const HREF_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Split `target|alias` into (target, alias).
fn split_alias(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('|') {
        Some((target, alias)) => (target.trim(), Some(alias.trim())),
        None => (raw.trim(), None),
    }
}

/// Split `Note#Heading` / `Note^block` into (base, suffix-with-separator).
fn split_suffix(target: &str) -> (&str, &str) {
    match target.find(['#', '^']) {
        Some(pos) => (target[..pos].trim(), &target[pos..]),
        None => (target.trim(), ""),
    }
}

/// Parse wikilinks from note text and return the set of canonical targets.
///
/// Spans whose base title is empty (e.g. `[[#Heading]]`) are skipped rather
/// than canonicalized: canonicalizing an empty title would mint a fresh
/// `Untitled-` id on every parse and litter the graph with ghost nodes.
pub fn extract_targets(text: &str) -> HashSet<NoteId> {
    let mut targets = HashSet::new();

    for caps in WIKILINK_RE.captures_iter(text) {
        let inner = caps[1].trim();
        if inner.is_empty() {
            continue;
        }

        let (target, _alias) = split_alias(inner);
        let (base, _suffix) = split_suffix(target);
        if base.is_empty() {
            continue;
        }

        targets.insert(NoteId::new(base));
    }

    targets
}

/// Rewrite wikilinks whose canonical base equals `old` so they point at
/// `new` instead, preserving alias and heading/block suffix.
///
/// Returns `(new_text, changed)`. No-op when either name is blank or both
/// canonicalize to the same id. Non-matching spans are byte-identical in the
/// output, so rewriting Old→New→Old round-trips exactly.
pub fn rewrite_targets(text: &str, old: &str, new: &str) -> (String, bool) {
    if old.trim().is_empty() || new.trim().is_empty() {
        return (text.to_string(), false);
    }

    let old_canon = safe_filename(old);
    let new_canon = safe_filename(new);
    if old_canon == new_canon {
        return (text.to_string(), false);
    }

    let changed = Cell::new(false);

    let rewritten = WIKILINK_RE.replace_all(text, |caps: &Captures| {
        let inner = caps[1].trim();
        if inner.is_empty() {
            return caps[0].to_string();
        }

        let (target, alias) = split_alias(inner);
        let (base, suffix) = split_suffix(target);

        if base.is_empty() || safe_filename(base) != old_canon {
            return caps[0].to_string();
        }

        changed.set(true);
        match alias {
            Some(alias) => format!("[[{}{}|{}]]", new_canon, suffix, alias),
            None => format!("[[{}{}]]", new_canon, suffix),
        }
    });

    (rewritten.into_owned(), changed.get())
}

/// Convert wikilinks into navigable HTML anchors.
///
///   [[Note]]         → <a href="note://Note">Note</a>
///   [[Note|Alias]]   → <a href="note://Note">Alias</a>
///   [[Note#Heading]] → <a href="note://Note#Heading">Note#Heading</a>
///
/// The label is HTML-escaped and the canonical id percent-encoded. A heading
/// or block suffix is folded into the URL fragment so the navigation layer
/// never mistakes it for part of the note title (which would otherwise create
/// "Note#Heading" notes on click).
pub fn render_links(text: &str) -> String {
    WIKILINK_RE
        .replace_all(text, |caps: &Captures| {
            let inner = caps[1].trim();
            if inner.is_empty() {
                return String::new();
            }

            let (target, alias) = split_alias(inner);
            let label = alias.unwrap_or(target);
            let (base, suffix) = split_suffix(target);
            if base.is_empty() {
                // Nothing to resolve; leave the span as written.
                return caps[0].to_string();
            }

            let canonical = safe_filename(base);
            let mut href = format!("note://{}", utf8_percent_encode(&canonical, HREF_ENCODE));

            if let Some(frag) = suffix.strip_prefix('#') {
                href.push('#');
                href.push_str(&utf8_percent_encode(frag, HREF_ENCODE).to_string());
            } else if suffix.starts_with('^') {
                // Block ids keep their leading '^' inside the fragment.
                href.push('#');
                href.push_str(&utf8_percent_encode(suffix, HREF_ENCODE).to_string());
            }

            format!("<a href=\"{}\">{}</a>", href, escape_html(label))
        })
        .into_owned()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> HashSet<NoteId> {
        names.iter().map(|n| NoteId::new(n)).collect()
    }

    #[test]
    fn test_extract_basic() {
        let text = "See [[Note A]] and [[Note B|alias]]";
        assert_eq!(extract_targets(text), ids(&["Note A", "Note B"]));
    }

    #[test]
    fn test_extract_suffixes() {
        let text = "[[Note#Heading]] and [[Note^block]]";
        assert_eq!(extract_targets(text), ids(&["Note"]));
    }

    #[test]
    fn test_extract_skips_empty_and_malformed() {
        assert!(extract_targets("[[]] [[ ]] [[#only-heading]]").is_empty());
        // no closing bracket: not a link
        assert!(extract_targets("[[Dangling").is_empty());
    }

    #[test]
    fn test_rewrite_simple() {
        let (out, changed) = rewrite_targets("Link to [[Old]]", "Old", "New");
        assert!(changed);
        assert_eq!(out, "Link to [[New]]");
    }

    #[test]
    fn test_rewrite_alias_and_suffix_preserved() {
        let (out, _) = rewrite_targets("[[Old|Alias]]", "Old", "New");
        assert_eq!(out, "[[New|Alias]]");

        let (out, _) = rewrite_targets("[[Old#Intro]] [[Old^b12]]", "Old", "New");
        assert_eq!(out, "[[New#Intro]] [[New^b12]]");
    }

    #[test]
    fn test_rewrite_is_canonical_comparison() {
        // "Old  Note" collapses to "Old Note", so the span matches
        let (out, changed) = rewrite_targets("[[Old  Note]]", "Old Note", "Fresh");
        assert!(changed);
        assert_eq!(out, "[[Fresh]]");
    }

    #[test]
    fn test_rewrite_noop_cases() {
        let (out, changed) = rewrite_targets("[[A]]", "A", "A");
        assert!(!changed);
        assert_eq!(out, "[[A]]");

        let (_, changed) = rewrite_targets("[[A]]", "", "B");
        assert!(!changed);
        let (_, changed) = rewrite_targets("[[A]]", "A", "   ");
        assert!(!changed);
    }

    #[test]
    fn test_rewrite_round_trip() {
        let original = "intro [[Old]] mid [[Old|label]] end [[Other]]";
        let (forward, changed) = rewrite_targets(original, "Old", "New");
        assert!(changed);
        let (back, changed) = rewrite_targets(&forward, "New", "Old");
        assert!(changed);
        assert_eq!(back, original);
    }

    #[test]
    fn test_rewrite_leaves_other_spans_untouched() {
        let text = "[[Keep]] and [[Old]]";
        let (out, _) = rewrite_targets(text, "Old", "New");
        assert_eq!(out, "[[Keep]] and [[New]]");
    }

    #[test]
    fn test_render_basic() {
        let html = render_links("[[Note|Hello]]");
        assert!(html.contains("href=\"note://Note\""));
        assert!(html.contains(">Hello<"));
    }

    #[test]
    fn test_render_escapes_label() {
        let html = render_links("[[Note|<b>&x]]");
        assert!(html.contains(">&lt;b&gt;&amp;x<"));
    }

    #[test]
    fn test_render_encodes_href() {
        let html = render_links("[[My Note]]");
        assert!(html.contains("href=\"note://My%20Note\""));
    }

    #[test]
    fn test_render_suffix_becomes_fragment() {
        let html = render_links("[[Note#Sec One]]");
        assert!(html.contains("href=\"note://Note#Sec%20One\""));

        let html = render_links("[[Note^blk]]");
        assert!(html.contains("href=\"note://Note#%5Eblk\""));
    }

    #[test]
    fn test_render_empty_inner_removed() {
        assert_eq!(render_links("a [[]] b"), "a  b");
    }
}
