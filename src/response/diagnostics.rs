//! Diagnostic error extraction
//!
//! Failed programs print `ERROR: ...` lines into the HTML body. These are
//! collected as plain text, independently of whether the body also carried
//! a usable result.

use regex::Regex;
use std::sync::OnceLock;

fn error_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A sentence starting at ERROR, allowed to wrap onto one more line
    RE.get_or_init(|| Regex::new(r"ERROR(?:.*\.|.*\n.*\.)").expect("valid error pattern"))
}

fn markup_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n|\s{2,}").expect("valid whitespace pattern"))
}

/// All `ERROR` sentences in `body`, with markup stripped and entities decoded.
pub fn extract_errors(body: &str) -> Vec<String> {
    error_line_pattern()
        .find_iter(body)
        .map(|m| {
            let text = markup_pattern().replace_all(m.as_str(), "");
            let text = whitespace_pattern().replace_all(&text, " ");
            html_escape::decode_html_entities(&text).into_owned()
        })
        .collect()
}
