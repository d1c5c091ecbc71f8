//! TOML question-set parser.
//!
//! Loads question sets from TOML files and directories. Structural problems
//! (missing reference answers, unknown kinds, duplicate ids) are
//! [`ConfigurationError`]s and stop the set from loading; softer issues are
//! reported as [`ValidationWarning`]s.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::model::{Language, Question, QuestionDetails, QuestionKind, QuestionSet, TestCase};

/// Intermediate TOML structure for parsing question-set files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question_set: TomlQuestionSetHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionSetHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_visible_test_cases")]
    visible_test_cases: usize,
    #[serde(default)]
    seed_sql: Option<String>,
    #[serde(default = "default_language_str")]
    default_language: String,
}

fn default_visible_test_cases() -> usize {
    crate::model::DEFAULT_VISIBLE_TEST_CASES
}

fn default_language_str() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    prompt: String,
    #[serde(default = "default_marks")]
    max_marks: u32,
    // coding
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    test_cases: Vec<TomlTestCase>,
    // sql
    #[serde(default)]
    reference_query: Option<String>,
    // mcq
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_option: Option<String>,
}

fn default_marks() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlTestCase {
    #[serde(default)]
    input: String,
    expected_output: String,
}

/// Parse a single TOML file into a `QuestionSet`.
pub fn parse_question_set(path: &Path) -> Result<QuestionSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question set file: {}", path.display()))?;

    Ok(parse_question_set_str(&content, path)?)
}

/// Parse a TOML string into a `QuestionSet` (useful for testing).
pub fn parse_question_set_str(
    content: &str,
    source_path: &Path,
) -> std::result::Result<QuestionSet, ConfigurationError> {
    let source_name = source_path.display().to_string();
    let parsed: TomlQuestionFile =
        toml::from_str(content).map_err(|e| ConfigurationError::Parse {
            source_name: source_name.clone(),
            message: e.to_string(),
        })?;

    let default_language: Language =
        parsed
            .question_set
            .default_language
            .parse()
            .map_err(|message: String| ConfigurationError::Parse {
                source_name: source_name.clone(),
                message,
            })?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| convert_question(q, default_language))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let set = QuestionSet {
        id: parsed.question_set.id,
        name: parsed.question_set.name,
        description: parsed.question_set.description,
        visible_test_cases: parsed.question_set.visible_test_cases,
        seed_sql: parsed.question_set.seed_sql,
        questions,
    };

    check_question_set(&set)?;
    Ok(set)
}

fn convert_question(
    q: TomlQuestion,
    default_language: Language,
) -> std::result::Result<Question, ConfigurationError> {
    let kind: QuestionKind = q.kind.parse().map_err(|message| ConfigurationError::InvalidField {
        question_id: q.id.clone(),
        field: "kind",
        message,
    })?;

    let details = match kind {
        QuestionKind::Coding => {
            let language = q
                .language
                .as_deref()
                .map(str::parse::<Language>)
                .transpose()
                .map_err(|message| ConfigurationError::InvalidField {
                    question_id: q.id.clone(),
                    field: "language",
                    message,
                })?
                .unwrap_or(default_language);
            QuestionDetails::Coding {
                language,
                test_cases: q
                    .test_cases
                    .into_iter()
                    .map(|t| TestCase {
                        input: t.input,
                        expected_output: t.expected_output,
                    })
                    .collect(),
            }
        }
        QuestionKind::Sql => QuestionDetails::Sql {
            reference_query: q.reference_query.ok_or_else(|| ConfigurationError::MissingField {
                question_id: q.id.clone(),
                field: "reference_query",
            })?,
        },
        QuestionKind::Mcq => QuestionDetails::Mcq {
            options: q.options,
            correct_option: q.correct_option.ok_or_else(|| ConfigurationError::MissingField {
                question_id: q.id.clone(),
                field: "correct_option",
            })?,
        },
    };

    Ok(Question {
        id: q.id,
        title: q.title,
        prompt: q.prompt,
        max_marks: q.max_marks,
        details,
    })
}

/// Reject question sets that cannot be graded.
///
/// Runs on every parsed set; call it directly for sets built in code.
pub fn check_question_set(set: &QuestionSet) -> std::result::Result<(), ConfigurationError> {
    let mut seen_ids = HashSet::new();
    for question in &set.questions {
        if !seen_ids.insert(question.id.as_str()) {
            return Err(ConfigurationError::DuplicateQuestion(question.id.clone()));
        }

        match &question.details {
            QuestionDetails::Coding { test_cases, .. } => {
                if test_cases.is_empty() {
                    return Err(ConfigurationError::MissingField {
                        question_id: question.id.clone(),
                        field: "test_cases",
                    });
                }
            }
            QuestionDetails::Sql { reference_query } => {
                if reference_query.trim().is_empty() {
                    return Err(ConfigurationError::MissingField {
                        question_id: question.id.clone(),
                        field: "reference_query",
                    });
                }
            }
            QuestionDetails::Mcq {
                options,
                correct_option,
            } => {
                if options.is_empty() {
                    return Err(ConfigurationError::MissingField {
                        question_id: question.id.clone(),
                        field: "options",
                    });
                }
                if !options.contains(correct_option) {
                    return Err(ConfigurationError::InvalidField {
                        question_id: question.id.clone(),
                        field: "correct_option",
                        message: format!("'{correct_option}' is not one of the options"),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Recursively load all `.toml` question-set files from a directory.
pub fn load_question_directory(dir: &Path) -> Result<Vec<QuestionSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_question_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// A non-fatal issue found in a question set.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a question set for issues that do not prevent grading.
pub fn validate_question_set(set: &QuestionSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let has_sql = set.questions.iter().any(|q| q.kind() == QuestionKind::Sql);
    if has_sql && set.seed_sql.as_deref().map_or(true, |s| s.trim().is_empty()) {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "set has SQL questions but no seed_sql; queries run against an empty database"
                .into(),
        });
    }

    for question in &set.questions {
        let warn = |message: String| ValidationWarning {
            question_id: Some(question.id.clone()),
            message,
        };

        if question.max_marks == 0 {
            warnings.push(warn("max_marks is 0".into()));
        }
        if question.prompt.trim().is_empty() {
            warnings.push(warn("prompt is empty".into()));
        }

        match &question.details {
            QuestionDetails::Coding { test_cases, .. } => {
                if test_cases.len() <= set.visible_test_cases {
                    warnings.push(warn(format!(
                        "no hidden test cases ({} total, {} visible); score uses all cases",
                        test_cases.len(),
                        set.visible_test_cases
                    )));
                }
            }
            QuestionDetails::Mcq { options, .. } => {
                let unique: HashSet<&String> = options.iter().collect();
                if unique.len() != options.len() {
                    warnings.push(warn("duplicate options".into()));
                }
            }
            QuestionDetails::Sql { .. } => {}
        }
    }

    warnings
}
