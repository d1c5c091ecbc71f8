//! examgate CLI: checks the attempt gate and grades exam submissions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "examgate", version, about = "Attempt-gated grader for coding, SQL and MCQ exams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a user may start a timed test
    Check {
        /// User identifier
        #[arg(long)]
        user: String,

        /// Evaluate at this RFC 3339 time instead of now
        #[arg(long)]
        at: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade a submission against a question set
    Grade {
        /// Path to the .toml question set
        #[arg(long)]
        question_set: PathBuf,

        /// Path to the submission JSON
        #[arg(long)]
        submission: PathBuf,

        /// Output directory for the report (default from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Grade and record the attempt at this RFC 3339 time instead of now
        #[arg(long)]
        at: Option<String>,

        /// Print the summary as markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Validate question-set TOML files
    Validate {
        /// Path to question-set file or directory
        #[arg(long)]
        question_set: PathBuf,
    },

    /// Create starter config and example question set
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "examgate=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { user, at, config } => commands::check::execute(user, at, config).await,
        Commands::Grade {
            question_set,
            submission,
            output,
            config,
            at,
            markdown,
        } => commands::grade::execute(question_set, submission, output, config, at, markdown).await,
        Commands::Validate { question_set } => commands::validate::execute(question_set),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
