//! Grading orchestrator.
//!
//! Runs every answer of a submission through the right collaborator, turns
//! runtime failures into zero-credit results and aggregates the exam score
//! once at the end.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ExecutionError;
use crate::model::{Answer, Question, QuestionDetails, QuestionKind, QuestionResult, QuestionSet, Submission};
use crate::scoring::{self, ExamScore, ScoreEngine};
use crate::traits::{CodeExecutor, QueryEngine, RunRequest};

/// Configuration for the grader.
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Overrides the question set's `visible_test_cases` when set.
    pub visible_test_cases: Option<usize>,
    /// Maximum concurrent code executions.
    pub parallelism: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            visible_test_cases: None,
            parallelism: 4,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_question_start(&self, question_id: &str, kind: QuestionKind);
    fn on_question_complete(&self, result: &QuestionResult);
    fn on_exam_complete(&self, score: &ExamScore, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_question_start(&self, _: &str, _: QuestionKind) {}
    fn on_question_complete(&self, _: &QuestionResult) {}
    fn on_exam_complete(&self, _: &ExamScore, _: Duration) {}
}

/// Result of one test case of a coding answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    /// Position in the question's test-case list.
    pub index: usize,
    /// Hidden cases are the ones after the visible samples.
    pub hidden: bool,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-test-case feedback for one coding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question_id: String,
    pub test_cases: Vec<TestCaseOutcome>,
}

/// Everything produced by grading one submission.
#[derive(Debug, Clone)]
pub struct GradedExam {
    /// One result per question, in question-set order.
    pub results: Vec<QuestionResult>,
    /// Test-case feedback for answered coding questions.
    pub feedback: Vec<QuestionFeedback>,
    pub score: ExamScore,
    pub duration_ms: u64,
}

/// Grades submissions against a question set.
pub struct Grader {
    executor: Arc<dyn CodeExecutor>,
    config: GraderConfig,
}

impl Grader {
    pub fn new(executor: Arc<dyn CodeExecutor>, config: GraderConfig) -> Self {
        Self { executor, config }
    }

    /// Grade `submission`. SQL answers run on `queries`, which must already be
    /// seeded with the set's dataset.
    pub async fn grade(
        &self,
        set: &QuestionSet,
        submission: &Submission,
        queries: &dyn QueryEngine,
        progress: &dyn ProgressReporter,
    ) -> GradedExam {
        let start = Instant::now();
        let visible = self
            .config
            .visible_test_cases
            .unwrap_or(set.visible_test_cases);

        let mut case_outcomes = self.run_coding_answers(set, submission, visible, progress).await;

        let mut results = Vec::with_capacity(set.questions.len());
        let mut feedback = Vec::new();

        for question in &set.questions {
            let answer = submission.answers.get(&question.id);
            if answer.is_some() && question.kind() != QuestionKind::Coding {
                progress.on_question_start(&question.id, question.kind());
            }

            let result = match (&question.details, answer) {
                (_, None) => QuestionResult::new(&question.id, question.kind(), question.max_marks, 0),
                (QuestionDetails::Coding { .. }, Some(Answer::Code { .. })) => {
                    let mut cases = case_outcomes
                        .remove(question.id.as_str())
                        .unwrap_or_default();
                    cases.sort_by_key(|c| c.index);
                    let result = coding_result(question, &cases, visible);
                    feedback.push(QuestionFeedback {
                        question_id: question.id.clone(),
                        test_cases: cases,
                    });
                    result
                }
                (QuestionDetails::Sql { reference_query }, Some(Answer::Query { sql })) => {
                    sql_result(question, reference_query, sql, queries)
                }
                (QuestionDetails::Mcq { correct_option, .. }, Some(Answer::Choice { option })) => {
                    let marks = scoring::mcq_marks(question.max_marks, Some(option.as_str()), correct_option);
                    QuestionResult::new(&question.id, question.kind(), question.max_marks, i64::from(marks))
                }
                (details, Some(answer)) => QuestionResult::failed(
                    &question.id,
                    question.kind(),
                    question.max_marks,
                    format!(
                        "expected a {} answer, got a {} answer",
                        details.kind(),
                        answer_label(answer)
                    ),
                ),
            };

            progress.on_question_complete(&result);
            results.push(result);
        }

        let score = ScoreEngine::compute(&results);
        let elapsed = start.elapsed();
        progress.on_exam_complete(&score, elapsed);

        GradedExam {
            results,
            feedback,
            score,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Run every test case of every answered coding question, bounded by
    /// `parallelism`. Returns outcomes grouped by question id, unordered.
    async fn run_coding_answers<'a>(
        &self,
        set: &'a QuestionSet,
        submission: &'a Submission,
        visible: usize,
        progress: &dyn ProgressReporter,
    ) -> HashMap<&'a str, Vec<TestCaseOutcome>> {
        let semaphore = Semaphore::new(self.config.parallelism.max(1));
        let mut runs = FuturesUnordered::new();

        for question in &set.questions {
            let QuestionDetails::Coding {
                language,
                test_cases,
            } = &question.details
            else {
                continue;
            };
            let Some(Answer::Code {
                language: chosen,
                source,
            }) = submission.answers.get(&question.id)
            else {
                continue;
            };

            progress.on_question_start(&question.id, QuestionKind::Coding);
            let language = chosen.unwrap_or(*language);

            for (index, case) in test_cases.iter().enumerate() {
                let request = RunRequest {
                    source: source.clone(),
                    language,
                    stdin: case.input.clone(),
                };
                let semaphore = &semaphore;
                let executor = &self.executor;
                let question_id = question.id.as_str();

                runs.push(async move {
                    let run = match semaphore.acquire().await {
                        Ok(_permit) => executor.run_code(&request).await,
                        Err(_) => Err(ExecutionError::Transport("semaphore closed".into())),
                    };
                    let outcome = match run {
                        Ok(output) => TestCaseOutcome {
                            index,
                            hidden: index >= visible,
                            passed: scoring::output_matches(&output.stdout, &case.expected_output),
                            error: None,
                        },
                        Err(e) => {
                            tracing::warn!(
                                question = question_id,
                                case = index,
                                "execution failed: {e}"
                            );
                            TestCaseOutcome {
                                index,
                                hidden: index >= visible,
                                passed: false,
                                error: Some(e.to_string()),
                            }
                        }
                    };
                    (question_id, outcome)
                });
            }
        }

        let mut grouped: HashMap<&str, Vec<TestCaseOutcome>> = HashMap::new();
        while let Some((question_id, outcome)) = runs.next().await {
            grouped.entry(question_id).or_default().push(outcome);
        }
        grouped
    }
}

fn coding_result(question: &Question, cases: &[TestCaseOutcome], visible: usize) -> QuestionResult {
    let passed: Vec<bool> = cases.iter().map(|c| c.passed).collect();
    let marks = scoring::coding_marks(question.max_marks, &passed, visible);
    let mut result = QuestionResult::new(&question.id, question.kind(), question.max_marks, i64::from(marks));

    // Surface the error only when nothing ran at all.
    if !cases.is_empty() && cases.iter().all(|c| c.error.is_some()) {
        result.error = cases[0].error.clone();
    }
    result
}

fn sql_result(question: &Question, reference: &str, sql: &str, queries: &dyn QueryEngine) -> QuestionResult {
    let expected = match queries.run_query(reference) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(question = %question.id, "reference query failed: {e}");
            return QuestionResult::failed(
                &question.id,
                question.kind(),
                question.max_marks,
                format!("reference query failed: {e}"),
            );
        }
    };

    match queries.run_query(sql) {
        Ok(actual) => {
            let marks = scoring::sql_marks(question.max_marks, scoring::rows_match(&actual, &expected));
            QuestionResult::new(&question.id, question.kind(), question.max_marks, i64::from(marks))
        }
        Err(e) => QuestionResult::failed(&question.id, question.kind(), question.max_marks, e.to_string()),
    }
}

fn answer_label(answer: &Answer) -> &'static str {
    match answer {
        Answer::Code { .. } => "code",
        Answer::Query { .. } => "query",
        Answer::Choice { .. } => "choice",
    }
}
