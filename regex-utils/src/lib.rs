//! Regex utilities for syntax-architect
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Markdown code fence patterns used when isolating model output
///
/// A closing fence only counts at the start of a line, so backticks inside a
/// JSON string (always on one line once serialized) never end the block.
pub mod fence {
    use super::*;

    pub static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?is)```[ \t]*json[ \t]*\r?\n?(.*?)\r?\n[ \t]*```").expect("Invalid regex pattern")
    });

    pub static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)\r?\n[ \t]*```")
            .expect("Invalid regex pattern")
    });

    /// Bodies of every ```json fenced block, in document order
    pub fn json_blocks(text: &str) -> Vec<&str> {
        JSON_FENCE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// `(tag, body)` for every fenced block, tagged or not
    pub fn blocks(text: &str) -> Vec<(&str, &str)> {
        ANY_FENCE
            .captures_iter(text)
            .filter_map(|caps| {
                let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                caps.get(2).map(|body| (tag, body.as_str()))
            })
            .collect()
    }
}

/// Patterns for normalizing almost-JSON text
pub mod json_text {
    use super::*;
    use std::borrow::Cow;

    /// Runs of whitespace and control characters
    pub static WHITESPACE_RUN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\s\p{Cc}]+").expect("Invalid regex pattern"));

    /// Either a legal JSON escape (group 1) or a backslash before anything else (group 2)
    pub static ESCAPE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?s)\\(u[0-9a-fA-F]{4}|["\\/bfnrt])|\\(.)"#).expect("Invalid regex pattern")
    });

    /// Collapse every run of whitespace/control characters into one space
    pub fn collapse_whitespace(text: &str) -> Cow<'_, str> {
        WHITESPACE_RUN.replace_all(text, " ")
    }

    /// Drop backslashes that do not start a legal JSON escape sequence
    pub fn strip_invalid_escapes(text: &str) -> Cow<'_, str> {
        ESCAPE.replace_all(text, |caps: &regex::Captures<'_>| match (caps.get(1), caps.get(2)) {
            (Some(_), _) => caps[0].to_string(),
            (None, Some(stray)) => stray.as_str().to_string(),
            (None, None) => String::new(),
        })
    }
}

/// Word-boundary keyword matching
pub mod keywords {
    use super::*;

    /// Case-insensitive matcher for a set of keywords or phrases
    #[derive(Debug, Clone)]
    pub struct KeywordMatcher {
        pattern: Option<Regex>,
    }

    impl KeywordMatcher {
        /// Build a matcher; multi-word phrases tolerate any whitespace between words
        pub fn new(keywords: &[&str]) -> Result<Self, regex::Error> {
            let alternatives: Vec<String> = keywords
                .iter()
                .map(|kw| {
                    kw.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+")
                })
                .filter(|alt| !alt.is_empty())
                .collect();

            if alternatives.is_empty() {
                return Ok(Self { pattern: None });
            }

            let source = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
            Ok(Self { pattern: Some(Regex::new(&source)?) })
        }

        pub fn is_match(&self, text: &str) -> bool {
            self.pattern.as_ref().is_some_and(|re| re.is_match(text))
        }

        /// First keyword occurrence, as written in `text`
        pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
            self.pattern.as_ref()?.find(text).map(|m| m.as_str())
        }
    }
}
