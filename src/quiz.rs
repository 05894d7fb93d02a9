//! Quiz results and the summary statistics reported alongside feedback.
//!
//! A [`QuizResult`] is the graded submission as JSON:
//!
//! ```json
//! {
//!   "score": 7,
//!   "total_questions": 10,
//!   "mcq": { "What is ATP?": { "is_correct": true, "selected": "..." } },
//!   "true_false": { "Cells divide.": { "is_correct": false } }
//! }
//! ```
//!
//! Only `is_correct` is read from each answer record; other fields are kept
//! verbatim so the result can be echoed back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    MultipleCorrect,
    FillInTheBlanks,
    TrueFalse,
}

impl QuestionType {
    /// Section order used for reporting.
    pub const ALL: [QuestionType; 4] = [
        QuestionType::Mcq,
        QuestionType::MultipleCorrect,
        QuestionType::FillInTheBlanks,
        QuestionType::TrueFalse,
    ];

    pub fn key(self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::MultipleCorrect => "multiple_correct",
            QuestionType::FillInTheBlanks => "fill_in_the_blanks",
            QuestionType::TrueFalse => "true_false",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(default)]
    pub is_correct: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Question text → answer record.
pub type Section = BTreeMap<String, AnswerRecord>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcq: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_correct: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_in_the_blanks: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_false: Option<Section>,
}

impl QuizResult {
    pub fn section(&self, kind: QuestionType) -> Option<&Section> {
        match kind {
            QuestionType::Mcq => self.mcq.as_ref(),
            QuestionType::MultipleCorrect => self.multiple_correct.as_ref(),
            QuestionType::FillInTheBlanks => self.fill_in_the_blanks.as_ref(),
            QuestionType::TrueFalse => self.true_false.as_ref(),
        }
    }
}

/// Load a [`QuizResult`] from a JSON file.
pub fn load_result(path: &Path) -> Result<QuizResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read quiz result: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse quiz result: {}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionStats {
    pub kind: QuestionType,
    pub correct: usize,
    pub answered: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStats {
    pub score: u32,
    pub total: u32,
    /// `score / total`, or 0 when there were no questions.
    pub accuracy: f64,
    /// One entry per non-empty section, in [`QuestionType::ALL`] order.
    pub by_type: Vec<SectionStats>,
}

impl QuizStats {
    pub fn from_result(result: &QuizResult) -> Self {
        let accuracy = if result.total_questions == 0 {
            0.0
        } else {
            f64::from(result.score) / f64::from(result.total_questions)
        };

        let by_type = QuestionType::ALL
            .iter()
            .filter_map(|&kind| {
                let section = result.section(kind).filter(|s| !s.is_empty())?;
                let correct = section.values().filter(|a| a.is_correct).count();
                Some(SectionStats {
                    kind,
                    correct,
                    answered: section.len(),
                    accuracy: correct as f64 / section.len() as f64,
                })
            })
            .collect();

        Self {
            score: result.score,
            total: result.total_questions,
            accuracy,
            by_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuizResult {
        serde_json::from_str(
            r#"{
                "score": 3,
                "total_questions": 4,
                "mcq": {
                    "Q1": { "is_correct": true, "selected": "A" },
                    "Q2": { "is_correct": false, "selected": "C" }
                },
                "multiple_correct": {},
                "true_false": {
                    "Q3": { "is_correct": true },
                    "Q4": { "is_correct": true }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_stats_accuracy_and_sections() {
        let stats = QuizStats::from_result(&sample());
        assert_eq!(stats.score, 3);
        assert_eq!(stats.total, 4);
        assert!((stats.accuracy - 0.75).abs() < 1e-9);

        let kinds: Vec<QuestionType> = stats.by_type.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![QuestionType::Mcq, QuestionType::TrueFalse]);
        assert!((stats.by_type[0].accuracy - 0.5).abs() < 1e-9);
        assert_eq!(stats.by_type[1].correct, 2);
    }

    #[test]
    fn test_zero_questions_has_zero_accuracy() {
        let stats = QuizStats::from_result(&QuizResult::default());
        assert_eq!(stats.accuracy, 0.0);
        assert!(stats.by_type.is_empty());
    }

    #[test]
    fn test_missing_is_correct_counts_as_wrong() {
        let result: QuizResult =
            serde_json::from_str(r#"{"score": 0, "total_questions": 1, "fill_in_the_blanks": {"Q": {"answer": "x"}}}"#)
                .unwrap();
        let stats = QuizStats::from_result(&result);
        assert_eq!(stats.by_type[0].kind, QuestionType::FillInTheBlanks);
        assert_eq!(stats.by_type[0].correct, 0);
    }

    #[test]
    fn test_extra_answer_fields_survive() {
        let result = sample();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mcq"]["Q1"]["selected"], "A");
        assert!(json.get("fill_in_the_blanks").is_none());
    }

    #[test]
    fn test_load_result_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        std::fs::write(&path, r#"{"score": 1, "total_questions": 2}"#).unwrap();
        let result = load_result(&path).unwrap();
        assert_eq!(result.total_questions, 2);

        assert!(load_result(&dir.path().join("missing.json")).is_err());
    }
}
