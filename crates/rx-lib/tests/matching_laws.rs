//! Cross-cutting properties the engine must uphold regardless of pattern.

mod common;

use core_compile::{regex_to_nfa, repeat_series};
use rx_lib::match_start;

/// A successful match consumes a prefix, and the reported index is exactly
/// that prefix's char length.
#[test]
fn matched_prefix_law() -> anyhow::Result<()> {
    common::init_tracing();
    let cases = [
        ("[a-z]+", "abc123"),
        ("[0-9]+", "1324354657"),
        (r"\w\w", "ab_"),
        ("a*", "aaab"),
        (".", "，x"),
    ];
    for (pattern, text) in cases {
        let mut nfa = regex_to_nfa(pattern)?;
        nfa.execute(text);
        assert!(nfa.is_matched(), "{pattern} should match {text:?}");
        let matched = nfa.matched_str().expect("matched string recorded");
        assert!(
            text.starts_with(matched),
            "{matched:?} is not a prefix of {text:?}"
        );
        assert_eq!(matched.chars().count(), nfa.matched_index());
    }
    Ok(())
}

/// Repeating a fragment `k` times in series accepts exactly the k-fold
/// language: `L(N)^k`.
#[test]
fn series_repetition_law() -> anyhow::Result<()> {
    common::init_tracing();
    let body = regex_to_nfa("ab")?;
    for k in 1..=3 {
        let mut repeated = repeat_series(&body, k)?;
        let yes: String = "ab".repeat(k as usize);
        repeated.execute(&yes);
        assert_eq!(
            repeated.matched_str(),
            Some(yes.as_str()),
            "expected (ab)^{k} to accept {yes:?}"
        );
        let under: String = "ab".repeat(k as usize - 1);
        repeated.execute(&under);
        assert!(
            !repeated.is_matched(),
            "(ab)^{k} must reject the {}-fold input",
            k - 1
        );
        let skewed = format!("{}aa", "ab".repeat(k as usize - 1));
        repeated.execute(&skewed);
        assert!(!repeated.is_matched(), "(ab)^{k} must reject {skewed:?}");
    }
    Ok(())
}

/// `{n}` through the full pipeline agrees with the series law.
#[test]
fn counted_quantifier_matches_exactly() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("a{3}", "aaa")?, Some((0, 3)));
    assert_eq!(match_start("a{3}", "aaaa")?, Some((0, 3)));
    assert_eq!(match_start("a{3}", "aa")?, None);
    assert_eq!(match_start("a{0}", "xyz")?, Some((0, 0)));
    Ok(())
}

/// `{n,}` and `{n,m}` bounds through the full pipeline.
#[test]
fn ranged_quantifier_bounds() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("a{2,}", "a")?, None);
    assert_eq!(match_start("a{2,}", "aaaa")?, Some((0, 4)));
    assert_eq!(match_start("a{1,3}", "aaaaa")?, Some((0, 3)));
    assert_eq!(match_start("a{,2}", "aaa")?, Some((0, 2)));
    Ok(())
}

/// Anchors through the full pipeline: `$` forbids a remainder.
#[test]
fn end_anchor_behavior() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("ab$", "ab")?, Some((0, 2)));
    assert_eq!(match_start("ab$", "abc")?, None);
    Ok(())
}

/// Grouped alternation-free composition: `(ab)+` loops whole groups.
#[test]
fn grouped_plus_loops_groups() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("(ab)+", "ababab")?, Some((0, 6)));
    assert_eq!(match_start("(ab)+", "abaab")?, Some((0, 2)));
    assert_eq!(match_start("(ab)+", "ba")?, None);
    Ok(())
}

/// A fully anchored email pattern exercising every construct at once.
#[test]
fn anchored_email_pattern() -> anyhow::Result<()> {
    common::init_tracing();
    let mut nfa = regex_to_nfa(r"^[\w-]+(\.[\w-]+)*@[\w-]+(\.[\w-]+)+$")?;
    nfa.execute("wangxin@hdu.edu.com");
    assert_eq!(nfa.matched_str(), Some("wangxin@hdu.edu.com"));
    nfa.execute("not-an-email");
    assert!(!nfa.is_matched());
    Ok(())
}
