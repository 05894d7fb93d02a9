//! Parsing of raw model replies into structured quiz data.
//!
//! Models frequently wrap JSON in Markdown fences or add a sentence before
//! or after it. Parsing therefore runs in three steps:
//!
//! 1. [`strip_code_fences`] removes a surrounding ```` ```json ```` fence.
//! 2. [`extract_json_object`] keeps the span from the first `{` to the last `}`.
//! 3. The span is decoded with `serde_json` and checked against the
//!    expected shape.
//!
//! Every failure is reported as a [`ResponseError`]; nothing here panics or
//! returns partially filled data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::ResponseError;

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing
/// ```` ``` ````, then trim whitespace.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

/// Return the span from the first `{` to the last `}` inclusive.
pub fn extract_json_object(text: &str) -> Result<&str, ResponseError> {
    let start = text.find('{').ok_or(ResponseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ResponseError::NoJsonObject)?;
    if end < start {
        return Err(ResponseError::NoJsonObject);
    }
    Ok(&text[start..=end])
}

/// Strip fences and decode the reply as a JSON object.
///
/// A reply that is valid JSON on its own must be an object. Otherwise the
/// object span is extracted from the surrounding prose and decoded.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, ResponseError> {
    let stripped = strip_code_fences(text);

    let value = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(extract_json_object(stripped)?)?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ResponseError::UnexpectedShape(
            "top-level value is not an object".to_string(),
        )),
    }
}

// ============ Multiple-choice questions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = ResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ResponseError::UnexpectedShape(format!(
                "unknown difficulty: {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mcq {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: String,
    pub difficulty: Difficulty,
}

/// Questions in the order the model produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McqSet {
    pub questions: Vec<Mcq>,
}

impl McqSet {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Deserialize)]
struct RawMcq {
    options: Vec<String>,
    correct_option: String,
    difficulty: String,
}

/// Parse a reply shaped as `{ "<question>": { options, correct_option, difficulty }, ... }`.
///
/// `correct_option` must be one of `options`.
pub fn parse_mcq_set(text: &str) -> Result<McqSet, ResponseError> {
    let map = parse_json_object(text)?;

    let mut questions = Vec::with_capacity(map.len());
    for (question, value) in map {
        let raw: RawMcq = serde_json::from_value(value)
            .map_err(|e| ResponseError::UnexpectedShape(format!("question {:?}: {}", question, e)))?;

        if raw.options.is_empty() {
            return Err(ResponseError::UnexpectedShape(format!(
                "question {:?} has no options",
                question
            )));
        }
        if !raw.options.contains(&raw.correct_option) {
            return Err(ResponseError::UnexpectedShape(format!(
                "question {:?}: correct_option is not one of the options",
                question
            )));
        }

        questions.push(Mcq {
            difficulty: raw.difficulty.parse()?,
            question,
            options: raw.options,
            correct_option: raw.correct_option,
        });
    }

    Ok(McqSet { questions })
}

// ============ Quiz feedback ============

/// Section keys of a feedback reply, in display order.
pub const FEEDBACK_SECTIONS: [&str; 5] = [
    "overall_performance",
    "strengths",
    "areas_for_improvement",
    "question_type_breakdown",
    "next_steps",
];

/// Free-text feedback on a quiz result, one paragraph per section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub overall_performance: String,
    pub strengths: String,
    pub areas_for_improvement: String,
    pub question_type_breakdown: String,
    pub next_steps: String,
}

/// Parse a feedback reply. Missing sections become empty strings; unknown
/// keys are ignored.
pub fn parse_feedback(text: &str) -> Result<Feedback, ResponseError> {
    let map = parse_json_object(text)?;
    let mut feedback = Feedback::default();

    for key in FEEDBACK_SECTIONS {
        let value = match map.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ResponseError::UnexpectedShape(format!(
                    "feedback section {:?} is not a string",
                    key
                )))
            }
        };
        let slot = match key {
            "overall_performance" => &mut feedback.overall_performance,
            "strengths" => &mut feedback.strengths,
            "areas_for_improvement" => &mut feedback.areas_for_improvement,
            "question_type_breakdown" => &mut feedback.question_type_breakdown,
            _ => &mut feedback.next_steps,
        };
        *slot = value;
    }

    Ok(feedback)
}
