//! The `examgate grade` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use examgate_core::gate::AttemptGate;
use examgate_core::grader::{Grader, ProgressReporter};
use examgate_core::model::{AttemptRecord, ExamMode, QuestionKind, QuestionResult, Submission};
use examgate_core::parser;
use examgate_core::report::ExamReport;
use examgate_core::scoring::ExamScore;
use examgate_runner::{create_executor, SqlSession};
use examgate_store::create_store;

use crate::config::load_config_from;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_question_start(&self, question_id: &str, kind: QuestionKind) {
        eprintln!("  Grading: {question_id} ({kind})");
    }

    fn on_question_complete(&self, result: &QuestionResult) {
        match &result.error {
            Some(error) => eprintln!(
                "  Done: {} {}/{} ({error})",
                result.question_id, result.awarded_marks, result.max_marks
            ),
            None => eprintln!(
                "  Done: {} {}/{}",
                result.question_id, result.awarded_marks, result.max_marks
            ),
        }
    }

    fn on_exam_complete(&self, score: &ExamScore, elapsed: Duration) {
        eprintln!(
            "\nComplete: {}/{} marks ({:.1}s)",
            score.total_score,
            score.total_marks,
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    question_set_path: PathBuf,
    submission_path: PathBuf,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    at: Option<String>,
    markdown: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let now = super::parse_at(at.as_deref())?;

    // Configuration errors stop the exam before anything runs.
    let set = parser::parse_question_set(&question_set_path)?;
    for w in parser::validate_question_set(&set) {
        match &w.question_id {
            Some(id) => tracing::warn!(question = %id, "{}", w.message),
            None => tracing::warn!("{}", w.message),
        }
    }

    let content = std::fs::read_to_string(&submission_path)
        .with_context(|| format!("failed to read submission: {}", submission_path.display()))?;
    let submission: Submission = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse submission: {}", submission_path.display()))?;
    anyhow::ensure!(
        !submission.user_id.trim().is_empty(),
        "submission has no user_id"
    );
    for id in submission.answers.keys() {
        if set.question(id).is_none() {
            tracing::warn!(question = %id, "answer for unknown question ignored");
        }
    }

    let gate = AttemptGate::new(config.gate.to_gate_config()?);
    let store = create_store(&config.store);

    if submission.mode == ExamMode::Timed {
        let outcome = gate.check(store.as_ref(), &submission.user_id, now).await;
        if let Some(e) = outcome.storage_error() {
            tracing::warn!(user = %submission.user_id, "attempt history unavailable, allowing attempt: {e}");
        }
        let decision = outcome.decision();
        if let (true, Some(unlocks_at)) = (decision.blocked, decision.unlocks_at) {
            anyhow::bail!(
                "attempt limit reached for user '{}': next attempt unlocks at {}",
                submission.user_id,
                unlocks_at.to_rfc3339()
            );
        }
    }

    let session = SqlSession::open(set.seed_sql.as_deref()).context("failed to prepare SQL dataset")?;
    let executor = create_executor(&config.executor)?;
    let grader = Grader::new(executor, config.grading.to_grader_config());

    eprintln!(
        "examgate v{} - Grading {} ({} questions, {} mode) for {}",
        env!("CARGO_PKG_VERSION"),
        set.name,
        set.questions.len(),
        submission.mode,
        submission.user_id
    );
    eprintln!();

    let graded = grader
        .grade(&set, &submission, &session, &ConsoleReporter)
        .await;
    let report = ExamReport::new(&set, &submission, graded, now);

    if markdown {
        print!("{}", report.to_markdown());
    } else {
        print_summary(&report);
    }

    let output_dir = output.unwrap_or(config.output_dir);
    let path = output_dir.join(report.file_name());
    report.save_json(&path)?;
    eprintln!("Report saved to: {}", path.display());

    if submission.mode == ExamMode::Timed {
        let record = AttemptRecord::new(submission.user_id.clone(), now);
        if let Err(e) = store.record_attempt(&record).await {
            tracing::warn!(user = %submission.user_id, "failed to record attempt: {e}");
        }
    }

    Ok(())
}

fn print_summary(report: &ExamReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Question", "Kind", "Marks", "Note"]);

    for r in &report.results {
        table.add_row(vec![
            Cell::new(&r.question_id),
            Cell::new(r.kind),
            Cell::new(format!("{}/{}", r.awarded_marks, r.max_marks)),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");

    let score = &report.score;
    println!(
        "Total: {}/{} ({}%)  coding {}  sql {}  mcq {} ({} correct)",
        score.total_score,
        score.total_marks,
        score.percentage,
        score.coding_score,
        score.sql_score,
        score.mcq_score,
        score.mcq_correct_count
    );
}
