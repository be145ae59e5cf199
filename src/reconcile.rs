//! Delta reconciliation for streamed generation text.
//!
//! The remote endpoint does not guarantee clean deltas: a fragment may be a
//! cumulative resend of everything the session produced so far, and the
//! end-of-session snapshot may disagree with the fragment stream. These
//! helpers reduce raw fragments to true deltas and stitch the snapshot
//! onto what was already observed without duplicating text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// The end marker in literal, backslash-hex-escaped, and HTML-entity
    /// escaped forms. Models emit any of the three.
    static ref END_MARK_RE: Regex = Regex::new(
        r"(?:<!--|\\x3[cC]!--|&lt;!--) END_OF_README (?:-->|--\\x3[eE]|--&gt;)",
    )
    .expect("end marker pattern must compile");
}

/// Longest form the pattern can match, in bytes. Lets callers rescan only
/// the tail of a growing buffer.
pub const END_MARK_MAX_LEN: usize = 28;

/// Return the suffix of `raw` after its longest common prefix with `seen`.
///
/// Early-exits at the first divergence, so cumulative resends cost time
/// proportional to the shared prefix rather than the full strings.
pub fn incremental_delta<'a>(seen: &str, raw: &'a str) -> &'a str {
    let mut split = 0;
    for ((i, a), b) in raw.char_indices().zip(seen.chars()) {
        if a != b {
            break;
        }
        split = i + a.len_utf8();
    }
    &raw[split..]
}

/// Merge the end-of-session snapshot into the text observed from the
/// fragment stream, duplicating no byte of `seen`.
///
/// Containment is checked first (either string fully ahead of the other),
/// then the maximal suffix-of-`seen` == prefix-of-`final_full` overlap,
/// scanning overlap lengths from largest to smallest. With no overlap at
/// all the longer candidate wins; when the two diverge with no shared
/// boundary that guess can corrupt content, but it is the established
/// behavior (see DESIGN.md).
pub fn stitch(seen: &str, final_full: &str) -> String {
    if seen.is_empty() {
        return final_full.to_string();
    }
    if final_full.is_empty() || seen.starts_with(final_full) {
        return seen.to_string();
    }
    if final_full.starts_with(seen) {
        return final_full.to_string();
    }

    let max = seen.len().min(final_full.len());
    for k in (1..=max).rev() {
        if !final_full.is_char_boundary(k) {
            continue;
        }
        if seen.ends_with(&final_full[..k]) {
            let mut merged = String::with_capacity(seen.len() + final_full.len() - k);
            merged.push_str(seen);
            merged.push_str(&final_full[k..]);
            return merged;
        }
    }

    if final_full.len() > seen.len() {
        final_full.to_string()
    } else {
        seen.to_string()
    }
}

/// Byte offset just past the first end marker occurrence, if any.
pub fn end_mark_end(text: &str) -> Option<usize> {
    END_MARK_RE.find(text).map(|m| m.end())
}

/// Whether the text contains the end marker in any tolerated form.
pub fn contains_end_mark(text: &str) -> bool {
    END_MARK_RE.is_match(text)
}
