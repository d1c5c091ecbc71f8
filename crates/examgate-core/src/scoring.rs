//! Marking policies and exam score aggregation.
//!
//! All arithmetic is integer-only. Every rounding point rounds half up and no
//! fractional marks are carried between stages.

use serde::{Deserialize, Serialize};

use crate::model::{QuestionKind, QuestionResult};
use crate::traits::{QueryOutput, SqlValue};

/// `round(numerator / denominator)` with halves rounded up. `denominator` must be non-zero.
pub fn round_ratio(numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0);
    (2 * numerator + denominator) / (2 * denominator)
}

/// `round(100 * score / total)`, or 0 when `total` is 0.
pub fn percentage(score: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    round_ratio(100 * score.min(total), total) as u32
}

// ---------------------------------------------------------------------------
// Coding
// ---------------------------------------------------------------------------

/// A test case passes when trimmed stdout equals the trimmed expectation exactly.
pub fn output_matches(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

/// Marks for a coding question from per-test-case pass flags (in test-case order).
///
/// Only hidden cases (those after the first `visible_count`) count. When the
/// question has no hidden cases the ratio over all cases is used instead.
pub fn coding_marks(max_marks: u32, passed: &[bool], visible_count: usize) -> u32 {
    let hidden = passed.get(visible_count..).unwrap_or_default();
    let pool = if hidden.is_empty() { passed } else { hidden };
    if pool.is_empty() {
        return 0;
    }
    let passes = pool.iter().filter(|p| **p).count() as u64;
    round_ratio(u64::from(max_marks) * passes, pool.len() as u64) as u32
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

const CELL_SEPARATOR: char = '|';
const ESCAPE: char = '\\';
/// Unescaped marker for NULL. Escaped text never contains a bare `\N`
/// at cell level, so NULL cannot equal any text value.
const NULL_SENTINEL: &str = "\\N";

fn push_cell(out: &mut String, value: &SqlValue) {
    if let SqlValue::Null = value {
        out.push_str(NULL_SENTINEL);
        return;
    }
    for ch in value.to_string().chars() {
        if ch == ESCAPE || ch == CELL_SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
}

/// Encode a row as a single string. Distinct rows of cell texts never share an encoding.
pub fn normalize_row(row: &[SqlValue]) -> String {
    let mut out = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push(CELL_SEPARATOR);
        }
        push_cell(&mut out, cell);
    }
    out
}

/// Sorted normalized rows: a multiset representation of the row-set.
pub fn normalized_rows(output: &QueryOutput) -> Vec<String> {
    let mut rows: Vec<String> = output.rows.iter().map(|r| normalize_row(r)).collect();
    rows.sort_unstable();
    rows
}

/// Order-independent, duplicate-sensitive row-set equality. Column names are ignored.
pub fn rows_match(actual: &QueryOutput, expected: &QueryOutput) -> bool {
    actual.rows.len() == expected.rows.len() && normalized_rows(actual) == normalized_rows(expected)
}

/// Binary SQL marking.
pub fn sql_marks(max_marks: u32, rows_equal: bool) -> u32 {
    if rows_equal {
        max_marks
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// MCQ
// ---------------------------------------------------------------------------

/// Exact-match MCQ marking; unanswered scores zero.
pub fn mcq_marks(max_marks: u32, selected: Option<&str>, correct: &str) -> u32 {
    match selected {
        Some(option) if option == correct => max_marks,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate result of one completed exam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamScore {
    pub coding_score: u64,
    pub sql_score: u64,
    pub mcq_score: u64,
    pub total_score: u64,
    pub total_marks: u64,
    /// `round(100 * total_score / total_marks)`, 0 for an exam worth nothing.
    pub percentage: u32,
    /// Any coding credit at all counts as passed.
    pub coding_passed: bool,
    /// MCQ results awarded full marks.
    pub mcq_correct_count: usize,
}

impl ExamScore {
    /// Score of everything that is not a coding question.
    pub fn non_coding_score(&self) -> u64 {
        self.sql_score + self.mcq_score
    }
}

/// Turns per-question results into an [`ExamScore`].
pub struct ScoreEngine;

impl ScoreEngine {
    /// Clamp `awarded_marks` into `[0, max_marks]`.
    pub fn clamp_awarded(result: &QuestionResult) -> u32 {
        let max = i64::from(result.max_marks);
        let clamped = result.awarded_marks.clamp(0, max);
        if clamped != result.awarded_marks {
            tracing::warn!(
                question_id = %result.question_id,
                awarded = result.awarded_marks,
                max_marks = result.max_marks,
                "awarded marks out of range, clamping"
            );
        }
        clamped as u32
    }

    /// Compute the exam score. Never fails; out-of-range marks are clamped.
    pub fn compute(results: &[QuestionResult]) -> ExamScore {
        let mut score = ExamScore::default();

        for result in results {
            let awarded = u64::from(Self::clamp_awarded(result));
            score.total_marks += u64::from(result.max_marks);
            match result.kind {
                QuestionKind::Coding => score.coding_score += awarded,
                QuestionKind::Sql => score.sql_score += awarded,
                QuestionKind::Mcq => {
                    score.mcq_score += awarded;
                    if awarded == u64::from(result.max_marks) {
                        score.mcq_correct_count += 1;
                    }
                }
            }
        }

        score.total_score = score.coding_score + score.sql_score + score.mcq_score;
        score.percentage = percentage(score.total_score, score.total_marks);
        score.coding_passed = score.coding_score > 0;
        score
    }
}
