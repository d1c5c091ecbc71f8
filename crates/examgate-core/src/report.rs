//! Exam report types with JSON persistence.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grader::{GradedExam, QuestionFeedback};
use crate::model::{ExamMode, QuestionResult, QuestionSet, Submission};
use crate::scoring::ExamScore;

/// A complete, persisted exam report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the submission was graded.
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub mode: ExamMode,
    /// Summary of the question set.
    pub question_set: QuestionSetSummary,
    /// Per-question results in question-set order.
    pub results: Vec<QuestionResult>,
    /// Test-case feedback for coding answers.
    #[serde(default)]
    pub feedback: Vec<QuestionFeedback>,
    pub score: ExamScore,
    /// Wall-clock grading time in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a question set (without the question definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSetSummary {
    pub id: String,
    pub name: String,
    pub question_count: usize,
    pub total_marks: u64,
}

impl From<&QuestionSet> for QuestionSetSummary {
    fn from(set: &QuestionSet) -> Self {
        Self {
            id: set.id.clone(),
            name: set.name.clone(),
            question_count: set.questions.len(),
            total_marks: set.total_marks(),
        }
    }
}

impl ExamReport {
    /// Build a report from a graded submission.
    pub fn new(
        set: &QuestionSet,
        submission: &Submission,
        graded: GradedExam,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            user_id: submission.user_id.clone(),
            mode: submission.mode,
            question_set: QuestionSetSummary::from(set),
            results: graded.results,
            feedback: graded.feedback,
            score: graded.score,
            duration_ms: graded.duration_ms,
        }
    }

    /// Default file name, e.g. `report-alice-20250310T120000Z-1b4e28ba.json`.
    ///
    /// The id suffix keeps reports graded in the same second apart. Characters
    /// outside `[A-Za-z0-9_-]` in the user id become `_`.
    pub fn file_name(&self) -> String {
        let user: String = self
            .user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let id = self.id.simple().to_string();
        format!(
            "report-{user}-{}-{}.json",
            self.created_at.format("%Y%m%dT%H%M%SZ"),
            &id[..8]
        )
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ExamReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Render a short markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# {} ({})\n", self.question_set.name, self.mode);
        let _ = writeln!(md, "User: `{}`  ", self.user_id);
        let _ = writeln!(
            md,
            "Score: **{}/{} ({}%)**\n",
            self.score.total_score, self.score.total_marks, self.score.percentage
        );

        md.push_str("| Question | Kind | Marks | Note |\n");
        md.push_str("|----------|------|-------|------|\n");
        for r in &self.results {
            let _ = writeln!(
                md,
                "| {} | {} | {}/{} | {} |",
                r.question_id,
                r.kind,
                r.awarded_marks,
                r.max_marks,
                r.error.as_deref().unwrap_or("")
            );
        }

        let _ = writeln!(
            md,
            "\nCoding {} | SQL {} | MCQ {} ({} correct)",
            self.score.coding_score,
            self.score.sql_score,
            self.score.mcq_score,
            self.score.mcq_correct_count
        );
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionKind;
    use crate::scoring::ScoreEngine;
    use chrono::TimeZone;

    fn make_report() -> ExamReport {
        let results = vec![
            QuestionResult::new("code", QuestionKind::Coding, 10, 10),
            QuestionResult::new("sql", QuestionKind::Sql, 5, 5),
            QuestionResult::failed("mcq", QuestionKind::Mcq, 5, "expected a mcq answer, got a query answer"),
        ];
        let score = ScoreEngine::compute(&results);
        ExamReport {
            id: Uuid::nil(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            user_id: "u1".into(),
            mode: ExamMode::Timed,
            question_set: QuestionSetSummary {
                id: "mixed".into(),
                name: "Mixed".into(),
                question_count: 3,
                total_marks: 20,
            },
            results,
            feedback: vec![],
            score,
            duration_ms: 12,
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(report.file_name());

        report.save_json(&path).unwrap();
        let loaded = ExamReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.results, report.results);
        assert_eq!(loaded.score, report.score);
        assert_eq!(loaded.score.percentage, 75);
    }

    #[test]
    fn file_name_has_user_timestamp_and_id() {
        assert_eq!(
            make_report().file_name(),
            "report-u1-20250310T120000Z-00000000.json"
        );
    }

    #[test]
    fn same_second_reports_get_distinct_names() {
        let first = make_report();
        let second = ExamReport {
            id: Uuid::new_v4(),
            ..make_report()
        };
        let third = ExamReport {
            id: Uuid::new_v4(),
            ..make_report()
        };
        assert_ne!(second.file_name(), third.file_name());
        assert_ne!(first.file_name(), second.file_name());
    }

    #[test]
    fn file_name_sanitizes_user_id() {
        let report = ExamReport {
            user_id: "../alice@example.com".into(),
            ..make_report()
        };
        assert_eq!(
            report.file_name(),
            "report-___alice_example_com-20250310T120000Z-00000000.json"
        );
    }

    #[test]
    fn load_missing_file_has_context() {
        let err = ExamReport::load_json(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read report"));
    }

    #[test]
    fn markdown_output() {
        let md = make_report().to_markdown();
        assert!(md.contains("# Mixed (timed)"));
        assert!(md.contains("15/20 (75%)"));
        assert!(md.contains("| mcq | mcq | 0/5 | expected a mcq answer"));
    }
}
