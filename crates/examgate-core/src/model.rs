//! Core data model types for examgate.
//!
//! Question definitions, submissions, per-question results and the attempt
//! records the gate reads.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of leading test cases shown to the user before submission.
pub const DEFAULT_VISIBLE_TEST_CASES: usize = 2;

/// The three question kinds an exam can mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Coding,
    Sql,
    Mcq,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Coding => write!(f, "coding"),
            QuestionKind::Sql => write!(f, "sql"),
            QuestionKind::Mcq => write!(f, "mcq"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coding" | "code" => Ok(QuestionKind::Coding),
            "sql" => Ok(QuestionKind::Sql),
            "mcq" | "aptitude" => Ok(QuestionKind::Mcq),
            other => Err(format!("unknown question kind: {other}")),
        }
    }
}

/// Languages a coding answer can be submitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Java,
    Cpp,
    C,
    Rust,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Java => write!(f, "java"),
            Language::Cpp => write!(f, "cpp"),
            Language::C => write!(f, "c"),
            Language::Rust => write!(f, "rust"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            "cpp" | "c++" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "rust" | "rs" => Ok(Language::Rust),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

/// One input/expected-output pair of a coding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Data fed to the program on stdin.
    #[serde(default)]
    pub input: String,
    /// Expected stdout, compared after trimming.
    pub expected_output: String,
}

/// Kind-specific part of a question definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QuestionDetails {
    Coding {
        /// Language used when the answer does not name one.
        language: Language,
        /// Ordered test cases; the leading `visible_test_cases` are samples.
        test_cases: Vec<TestCase>,
    },
    Sql {
        /// Canonical query whose row-set the user's query must reproduce.
        reference_query: String,
    },
    Mcq {
        options: Vec<String>,
        correct_option: String,
    },
}

impl QuestionDetails {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionDetails::Coding { .. } => QuestionKind::Coding,
            QuestionDetails::Sql { .. } => QuestionKind::Sql,
            QuestionDetails::Mcq { .. } => QuestionKind::Mcq,
        }
    }
}

/// A single question of a question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the set.
    pub id: String,
    /// Short human-readable title.
    #[serde(default)]
    pub title: String,
    /// Question text shown to the user.
    #[serde(default)]
    pub prompt: String,
    /// Marks awarded for a fully correct answer.
    pub max_marks: u32,
    #[serde(flatten)]
    pub details: QuestionDetails,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        self.details.kind()
    }
}

/// A collection of questions making up one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    /// Unique identifier for this set.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Number of leading test cases per coding question shown before submission.
    #[serde(default = "default_visible_test_cases")]
    pub visible_test_cases: usize,
    /// Schema and dataset script loaded into the SQL engine for each session.
    #[serde(default)]
    pub seed_sql: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

fn default_visible_test_cases() -> usize {
    DEFAULT_VISIBLE_TEST_CASES
}

impl QuestionSet {
    /// Sum of `max_marks` over all questions.
    pub fn total_marks(&self) -> u64 {
        self.questions.iter().map(|q| u64::from(q.max_marks)).sum()
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Whether a submission counts against the attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    #[default]
    Timed,
    Practice,
}

impl fmt::Display for ExamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamMode::Timed => write!(f, "timed"),
            ExamMode::Practice => write!(f, "practice"),
        }
    }
}

/// A user's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answer {
    Code {
        #[serde(default)]
        language: Option<Language>,
        source: String,
    },
    Query {
        sql: String,
    },
    Choice {
        option: String,
    },
}

/// Everything a user handed in for one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: String,
    #[serde(default)]
    pub mode: ExamMode,
    /// Answers keyed by question id; missing entries are unanswered.
    #[serde(default)]
    pub answers: HashMap<String, Answer>,
}

/// Outcome of one answered (or unanswered) question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub kind: QuestionKind,
    pub max_marks: u32,
    /// Marks as reported by the grader; clamped into `[0, max_marks]` when scored.
    pub awarded_marks: i64,
    /// Runtime error that forced zero credit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuestionResult {
    pub fn new(question_id: impl Into<String>, kind: QuestionKind, max_marks: u32, awarded_marks: i64) -> Self {
        Self {
            question_id: question_id.into(),
            kind,
            max_marks,
            awarded_marks,
            error: None,
        }
    }

    /// A zero-credit result carrying the error that caused it.
    pub fn failed(question_id: impl Into<String>, kind: QuestionKind, max_marks: u32, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(question_id, kind, max_marks, 0)
        }
    }
}

/// One past timed-test submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
        }
    }
}
