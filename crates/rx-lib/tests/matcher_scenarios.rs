//! End-to-end matcher scenarios over the public API.

mod common;

use pretty_assertions::assert_eq;
use rx_lib::{match_start, search, split, sub};

#[test]
fn match_digits_at_start() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("[0-9]+", "1324354657")?, Some((0, 10)));
    assert_eq!(match_start("[0-9]+", "hello itmo")?, None);
    Ok(())
}

#[test]
fn match_anchored_prefix() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(match_start("^hello", "hello itmo")?, Some((0, 5)));
    Ok(())
}

#[test]
fn search_slides_the_start_position() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(search("[0-9]+", "hello1324354657itmo")?, Some((5, 15)));
    Ok(())
}

#[test]
fn search_anchored_refuses_to_slide() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(search("^hello", "hello itmo")?, Some((0, 5)));
    assert_eq!(search("^itmo", "hello itmo")?, None);
    Ok(())
}

#[test]
fn search_empty_text_never_attempts() -> anyhow::Result<()> {
    common::init_tracing();
    // The unanchored scan iterates char positions; an empty text has none.
    assert_eq!(search("a*", "")?, None);
    Ok(())
}

#[test]
fn sub_strips_trailing_comment() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(
        sub(" #.*$", "", "2004-959-559 # this is a phone number", 1)?,
        "2004-959-559"
    );
    Ok(())
}

#[test]
fn sub_replaces_each_occurrence() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(sub("[0-9]+", "N", "a1b22c333", 3)?, "aNbNcN");
    Ok(())
}

#[test]
fn split_on_word_runs() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(
        split(r"\w+", "wxx，wxx，wxx，wxx，wxx", 0)?,
        vec!["", "，", "，", "，", "，", ""]
    );
    Ok(())
}

#[test]
fn split_respects_maxsplit() -> anyhow::Result<()> {
    common::init_tracing();
    assert_eq!(split(r"\w+", "ab cd ef", 1)?, vec!["", " cd ef"]);
    Ok(())
}

#[test]
fn search_finds_timestamp() -> anyhow::Result<()> {
    common::init_tracing();
    let text = "The system will be updated at 23:58:01 tomorrow";
    let span = search("[0-2][0-9]:[0-5][0-9]:[0-5][0-9]", text)?;
    assert_eq!(span, Some((30, 38)));
    let (start, end) = span.unwrap();
    assert_eq!(&text[start..end], "23:58:01");
    Ok(())
}

#[test]
fn search_finds_email_in_json() -> anyhow::Result<()> {
    common::init_tracing();
    let text = r#"{"name": "wxx", "email": "wangxinxin@hdu.edu.cn"}"#;
    let span = search(r"[\w-]+(\.[\w-]+)*@[\w-]+(\.[\w-]+)+", text)?;
    let (start, end) = span.expect("email should be found");
    assert_eq!(&text[start..end], "wangxinxin@hdu.edu.cn");
    Ok(())
}

#[test]
fn bad_patterns_surface_errors() {
    common::init_tracing();
    assert!(match_start(r"a\q", "aq").is_err());
    assert!(search("[0-9", "123").is_err());
    assert!(sub("a{x}", "b", "aaa", 1).is_err());
}
