//! Timestamp stripping for transcripts so subtitle-style markers never leak
//! into the composed message.

use std::sync::OnceLock;

use regex::Regex;

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("timestamp pattern compiles"))
}

/// Remove timestamp-like markers and collapse the whitespace they leave
/// behind.
///
/// Handles `[hh:mm:ss.mmm --> hh:mm:ss.mmm]` cue ranges, bracketed single
/// stamps like `[mm:ss.mmm]`, bare `hh:mm:ss - hh:mm:ss` / `mm:ss - mm:ss`
/// ranges, and parenthesized `(mm:ss)` markers. Only removes characters, so
/// the result is always a strict reduction of the input; running it twice is
/// a no-op.
pub fn strip_timestamps(text: &str) -> String {
    static CUE_RANGE: OnceLock<Regex> = OnceLock::new();
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    static BARE_RANGE: OnceLock<Regex> = OnceLock::new();
    static PARENTHESIZED: OnceLock<Regex> = OnceLock::new();

    let mut cleaned = pattern(
        &CUE_RANGE,
        r"\[\d{1,2}:\d{2}:\d{2}\.\d{1,3}\s*-->\s*\d{1,2}:\d{2}:\d{2}\.\d{1,3}\]",
    )
    .replace_all(text, "")
    .into_owned();
    cleaned = pattern(&BRACKETED, r"\[\d{1,2}:\d{2}(?::\d{2})?\.\d{1,3}\]")
        .replace_all(&cleaned, "")
        .into_owned();
    cleaned = pattern(
        &BARE_RANGE,
        r"\b\d{1,2}:\d{2}(?::\d{2})?\s*-\s*\d{1,2}:\d{2}(?::\d{2})?\b",
    )
    .replace_all(&cleaned, "")
    .into_owned();
    cleaned = pattern(&PARENTHESIZED, r"\(\d{1,2}:\d{2}\)")
        .replace_all(&cleaned, "")
        .into_owned();

    collapse_whitespace(&cleaned)
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
