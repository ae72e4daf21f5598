//! Lenient reader for the model's final answer.
//!
//! The answer is expected to carry `**ANALYSIS:**`, `**CONFIDENCE:** N%` and a
//! numbered `**SUGGESTED ACTIONS:**` list. Missing or malformed sections fall
//! back to defaults and never produce an error.

use regex::Regex;
use std::sync::LazyLock;

pub const EMPTY_ANSWER_TEXT: &str = "No analysis generated.";

/// Section labels at the start of a line, with optional bold markers.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*\*{0,2}[ \t]*(ANALYSIS|CONFIDENCE|SUGGESTED ACTIONS)[ \t]*\*{0,2}[ \t]*:[ \t]*\*{0,2}",
    )
    .expect("label regex is valid")
});

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)CONFIDENCE[ \t]*\*{0,2}[ \t]*:?[ \t]*\*{0,2}[ \t]*(\d+(?:\.\d+)?)")
        .expect("confidence regex is valid")
});

/// Leading number of a CONFIDENCE section body.
static SECTION_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*{0,2}[ \t]*(\d+(?:\.\d+)?)").expect("section number regex is valid")
});

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+?)\s*$").expect("action regex is valid"));

/// Any other bold or all-caps label ends the actions list.
static NEXT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\*\*|[A-Z][A-Z ]{2,}:)").expect("next label regex is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub analysis_text: String,
    pub suggested_actions: Vec<String>,
    pub confidence: Option<f64>,
}

pub fn parse_answer(text: &str) -> ParsedAnswer {
    let trimmed = text.trim();
    let analysis_text = match section(trimmed, "ANALYSIS") {
        Some(body) if !body.is_empty() => body.to_string(),
        _ if trimmed.is_empty() => EMPTY_ANSWER_TEXT.to_string(),
        _ => trimmed.to_string(),
    };
    ParsedAnswer {
        analysis_text,
        suggested_actions: parse_actions(trimmed),
        confidence: parse_confidence(trimmed),
    }
}

/// Confidence percentage converted to `[0, 1]`. Values above 100 clamp.
///
/// A labelled CONFIDENCE section is authoritative; free text is only searched
/// when the answer has no such label.
pub fn parse_confidence(text: &str) -> Option<f64> {
    let captures = match section(text, "CONFIDENCE") {
        Some(body) => SECTION_NUMBER_RE.captures(body)?,
        None => CONFIDENCE_RE.captures(text)?,
    };
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 100.0) / 100.0)
}

pub fn parse_actions(text: &str) -> Vec<String> {
    let Some(body) = section(text, "SUGGESTED ACTIONS") else {
        return Vec::new();
    };
    let mut actions = Vec::new();
    for line in body.lines() {
        if let Some(captures) = ACTION_RE.captures(line) {
            actions.push(captures[1].to_string());
        } else if !actions.is_empty() && NEXT_LABEL_RE.is_match(line) {
            break;
        }
    }
    actions
}

/// Body of the first section labelled `name`, up to the next known label.
fn section<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let mut labels = LABEL_RE.captures_iter(text);
    let start = labels.find(|caps| caps[1].eq_ignore_ascii_case(name))?;
    let body_start = start.get(0)?.end();
    let body_end = LABEL_RE
        .find_at(text, body_start)
        .map_or(text.len(), |next| next.start());
    Some(text[body_start..body_end].trim())
}
