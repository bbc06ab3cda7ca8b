//! rx-lib: the public matcher API.
//!
//! Thin wrappers over [`core_compile::regex_to_nfa`]: compile the pattern,
//! run the NFA over the relevant slice(s) of the text, and assemble spans,
//! replacements, or splits from the recorded matches. The engine itself only
//! ever matches a prefix of whatever it is handed; all scanning and
//! anchoring policy lives here.
//!
//! A `^` pattern is recognized syntactically (first pattern character) and
//! pins the single attempt at position zero; everything else slides the
//! start position forward one character at a time.
//!
//! All positions and counts are char positions, never byte offsets. Inputs
//! are free to be non-ASCII even though the character classes are ASCII.

use core_compile::regex_to_nfa;
use tracing::debug;

pub use core_compile::CompileError as Error;

/// Byte offset of the `i`-th character, or the end of the string.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b)
}

/// Split at a char position.
fn split_chars(s: &str, chars: usize) -> (&str, &str) {
    s.split_at(byte_offset(s, chars))
}

/// The substring covering char positions `start..end`.
fn char_range(s: &str, start: usize, end: usize) -> &str {
    &s[byte_offset(s, start)..byte_offset(s, end)]
}

/// Match the pattern at the start of `text`.
///
/// Returns the `(0, end)` span of the matched prefix, or `None`.
pub fn match_start(pattern: &str, text: &str) -> Result<Option<(usize, usize)>, Error> {
    let mut nfa = regex_to_nfa(pattern)?;
    nfa.execute(text);
    let span = nfa.is_matched().then(|| (0, nfa.matched_index()));
    debug!(target: "rx", pattern, ?span, "match_start");
    Ok(span)
}

/// Scan `text` for the first position where the pattern matches.
///
/// Anchored patterns get exactly one attempt at position zero. Note that an
/// unanchored scan of an empty `text` makes no attempts at all and reports
/// `None` even for patterns that match the empty string.
pub fn search(pattern: &str, text: &str) -> Result<Option<(usize, usize)>, Error> {
    let mut nfa = regex_to_nfa(pattern)?;
    if pattern.starts_with('^') {
        nfa.execute(text);
        if nfa.is_matched() {
            return Ok(Some((0, nfa.matched_index())));
        }
    } else {
        for (i, (b, _)) in text.char_indices().enumerate() {
            nfa.execute(&text[b..]);
            if nfa.is_matched() {
                return Ok(Some((i, i + nfa.matched_index())));
            }
        }
    }
    Ok(None)
}

/// Replace non-overlapping matches of the pattern with `repl`.
///
/// A positive `count` caps the number of replacements; `count == 0` falls
/// back to the char length of `repl`. Anchored patterns replace at most
/// once. After each replacement the scan cursor skips the replacement text
/// and one more character.
pub fn sub(pattern: &str, repl: &str, text: &str, count: usize) -> Result<String, Error> {
    let mut nfa = regex_to_nfa(pattern)?;
    let repl_len = repl.chars().count();
    let t_count = if count != 0 { count } else { repl_len };
    let mut res = text.to_string();
    if pattern.starts_with('^') {
        nfa.execute(&res);
        if nfa.is_matched() {
            let matched = nfa.matched_str().unwrap_or_default().to_string();
            res = res.replacen(&matched, repl, 1);
        }
        return Ok(res);
    }
    let mut i = 0;
    let mut done = 0;
    while i < res.chars().count() && done < t_count {
        let (head, tail) = {
            let (head, tail) = split_chars(&res, i);
            (head.to_string(), tail.to_string())
        };
        nfa.execute(&tail);
        if nfa.is_matched() {
            let matched = nfa.matched_str().unwrap_or_default().to_string();
            res = format!("{head}{}", tail.replacen(&matched, repl, 1));
            i += repl_len;
            done += 1;
        }
        i += 1;
    }
    Ok(res)
}

/// Partition `text` around non-overlapping matches of the pattern.
///
/// A positive `maxsplit` caps the number of splits; `maxsplit == 0` falls
/// back to the char length of `text`, which never binds. An anchored
/// pattern that matches yields the two-part prefix split; an anchored
/// pattern that does not match yields an empty list.
pub fn split(pattern: &str, text: &str, maxsplit: usize) -> Result<Vec<String>, Error> {
    let mut nfa = regex_to_nfa(pattern)?;
    let mut parts = Vec::new();
    if pattern.starts_with('^') {
        nfa.execute(text);
        if nfa.is_matched() {
            let matched = nfa.matched_str().unwrap_or_default();
            parts.push(String::new());
            parts.push(text.replacen(matched, "", 1));
        }
        return Ok(parts);
    }
    let text_len = text.chars().count();
    let t_count = if maxsplit != 0 { maxsplit } else { text_len };
    let mut i = 0;
    let mut from = 0;
    let mut done = 0;
    while i < text_len && done < t_count {
        nfa.execute(split_chars(text, i).1);
        if nfa.is_matched() {
            parts.push(char_range(text, from, i).to_string());
            i += nfa.matched_index();
            from = i;
            done += 1;
        } else {
            i += 1;
        }
    }
    parts.push(split_chars(text, i).1.to_string());
    Ok(parts)
}
