//! The `examgate init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examgate.toml").exists() {
        println!("examgate.toml already exists, skipping.");
    } else {
        std::fs::write("examgate.toml", SAMPLE_CONFIG)?;
        println!("Created examgate.toml");
    }

    std::fs::create_dir_all("question-sets")?;
    let example_path = std::path::Path::new("question-sets/example.toml");
    if example_path.exists() {
        println!("question-sets/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION_SET)?;
        println!("Created question-sets/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point [executor] at your Judge0 instance in examgate.toml");
    println!("  2. Run: examgate validate --question-set question-sets/example.toml");
    println!("  3. Run: examgate grade --question-set question-sets/example.toml --submission answers.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examgate configuration

output_dir = "./examgate-results"

# `type = "mock"` replays scripted outputs by stdin without running the
# submitted code. It is for offline fixtures only, never for real exams.
[executor]
type = "judge"
base_url = "http://localhost:2358"
api_key = "${JUDGE0_API_KEY}"
poll_interval_ms = 500
max_polls = 20
timeout_secs = 15

[store]
type = "file"
path = "./examgate-data/attempts.jsonl"

[gate]
max_attempts = 5
window_hours = 24

[grading]
parallelism = 4
"#;

const EXAMPLE_QUESTION_SET: &str = r#"[question_set]
id = "example"
name = "Example Assessment"
description = "One coding, one SQL and one multiple-choice question"
visible_test_cases = 1
seed_sql = """
CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL);
INSERT INTO products VALUES (1, 'pen', 1.5), (2, 'notebook', 4.0), (3, 'bag', 25.0);
"""

[[questions]]
id = "double"
kind = "coding"
title = "Double it"
prompt = "Read an integer from stdin and print twice its value."
max_marks = 10
language = "python"

[[questions.test_cases]]
input = "2"
expected_output = "4"

[[questions.test_cases]]
input = "-7"
expected_output = "-14"

[[questions.test_cases]]
input = "0"
expected_output = "0"

[[questions]]
id = "cheap-products"
kind = "sql"
title = "Cheap products"
prompt = "List the names of products priced under 5."
max_marks = 5
reference_query = "SELECT name FROM products WHERE price < 5"

[[questions]]
id = "http-status"
kind = "mcq"
title = "HTTP status"
prompt = "Which status code means Not Found?"
max_marks = 5
options = ["200", "301", "404", "500"]
correct_option = "404"
"#;
