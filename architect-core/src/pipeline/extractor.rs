//! Response extraction
//!
//! Model output is prose, fenced blocks, or bare JSON, and the JSON itself is
//! not always well-formed. Extraction isolates one `{...}` region and parses
//! it, repairing only whitespace and escaping when a strict parse fails.
//! Repair never reorders or drops keys.

use super::{PipelineError, Result, Stage};
use regex_utils::{fence, json_text};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Extract the single JSON object embedded in `raw`
///
/// The fenced block is tried first. If its region does not parse, the
/// first-`{`/last-`}` region of the whole text gets a second chance before
/// the fenced block's error is reported.
pub fn extract_json(raw: &str) -> Result<Value> {
    let whole = brace_region(raw);

    if let Some(block) = preferred_block(raw) {
        if let Ok(candidate) = brace_region(block) {
            let fenced_error = match parse_candidate(candidate) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if let Ok(outer) = whole {
                if outer != candidate {
                    if let Ok(value) = parse_candidate(outer) {
                        debug!("Fenced block did not parse, used the whole-text region instead");
                        return Ok(value);
                    }
                }
            }
            return Err(fenced_error);
        }
    }

    let candidate = whole.map_err(|message| extraction_error(message, raw))?;
    parse_candidate(candidate)
}

/// Extract and decode into `T`; decode failures are reported against `stage`
pub fn extract_json_as<T: DeserializeOwned>(raw: &str, stage: Stage) -> Result<T> {
    let value = extract_json(raw)?;
    serde_json::from_value(value)
        .map_err(|e| PipelineError::InvalidResponse { stage, message: e.to_string() })
}

/// Isolate the `{...}` region of `raw`
///
/// A ```json fence wins over everything else; an untagged fence is used only
/// when its body starts with `{`. Within the chosen text the region runs from
/// the first `{` to the last `}`.
pub fn locate_json(raw: &str) -> Result<&str> {
    let scope = preferred_block(raw).unwrap_or(raw);
    brace_region(scope).map_err(|message| extraction_error(message, raw))
}

fn brace_region(scope: &str) -> std::result::Result<&str, &'static str> {
    match (scope.find('{'), scope.rfind('}')) {
        (Some(open), Some(close)) if close > open => Ok(&scope[open..=close]),
        (None, _) => Err("no opening brace"),
        (_, None) => Err("no closing brace"),
        _ => Err("closing brace precedes opening brace"),
    }
}

/// Strict parse, then repair, then one level of unescaping
fn parse_candidate(candidate: &str) -> Result<Value> {
    let first_error = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!("Strict JSON parse failed ({}), attempting repair", first_error);

    let repaired = repair_json(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Some(unescaped) = unescape_stringified(&repaired) {
                if let Ok(value) = serde_json::from_str::<Value>(&unescaped) {
                    debug!("Recovered over-escaped JSON object");
                    return Ok(value);
                }
            }

            Err(PipelineError::Parse {
                message: e.to_string(),
                original: candidate.to_string(),
                repaired,
            })
        }
    }
}

fn preferred_block(raw: &str) -> Option<&str> {
    if let Some(block) = fence::json_blocks(raw).into_iter().find(|b| b.contains('{')) {
        return Some(block);
    }

    fence::blocks(raw)
        .into_iter()
        .find(|(tag, body)| tag.is_empty() && body.trim_start().starts_with('{'))
        .map(|(_, body)| body)
}

/// Normalize whitespace and escaping in a candidate JSON region
pub fn repair_json(candidate: &str) -> String {
    let collapsed = json_text::collapse_whitespace(candidate);
    json_text::strip_invalid_escapes(&collapsed).into_owned()
}

/// One level of unescaping for objects that arrive as `{\"key\": ...}`
fn unescape_stringified(text: &str) -> Option<String> {
    let body = text.trim_start_matches('{').trim_start();
    if !body.starts_with("\\\"") {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    Some(out)
}

fn extraction_error(message: &str, raw: &str) -> PipelineError {
    PipelineError::Extraction { message: message.to_string(), raw: raw.to_string() }
}
