//! Title tag codec.
//!
//! Tags ride inside the native title as a leading run of `[tag]` groups, so
//! the native schema never has to change. Tags containing `]` cannot be
//! represented, and a title that itself starts with bracket groups reads back
//! as tags. Neither case is escaped.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\[[^\]]+\]\s*)+").expect("static tag-run pattern"));
static TAG_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("static tag-group pattern"));

/// Splits a raw native title into its display title and tags.
pub fn decode(raw_title: &str) -> (String, Vec<String>) {
    match TAG_RUN.find(raw_title) {
        Some(run) => {
            let tags = TAG_GROUP
                .captures_iter(run.as_str())
                .map(|caps| caps[1].to_string())
                .collect();
            let title = raw_title[run.end()..].trim().to_string();
            (title, tags)
        }
        None => (raw_title.to_string(), Vec::new()),
    }
}

/// Builds the raw native title for a display title and its tags.
pub fn encode(title: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return title.to_string();
    }
    let mut raw: String = tags.iter().map(|tag| format!("[{}]", tag)).collect();
    raw.push(' ');
    raw.push_str(title);
    raw
}
