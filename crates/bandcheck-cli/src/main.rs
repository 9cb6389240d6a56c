//! bandcheck CLI: score practice tests, validate answer keys, and grade
//! speaking answers from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "bandcheck", version, about = "IELTS practice scorer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an answers file against an answer key
    Score {
        /// Answer key: a .toml path, or an id looked up in answer_keys_dir
        #[arg(long)]
        key: String,

        /// Learner answers (.json or .toml map of question id to answer)
        #[arg(long)]
        answers: PathBuf,

        /// Time taken, e.g. "3600", "58m", "1h2m30s"
        #[arg(long, default_value = "0")]
        time: String,

        /// Band table: a built-in name or a .toml file (default: the key's module)
        #[arg(long)]
        band_table: Option<String>,

        /// Exact matching only, no spelling tolerance
        #[arg(long)]
        strict: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write the attempt report to the output directory: json, html, all
        #[arg(long)]
        save: Option<String>,

        /// Output directory (default: output_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate answer-key TOML files
    Validate {
        /// Path to an answer key file or directory
        #[arg(long)]
        key: PathBuf,
    },

    /// Compare two saved attempts
    Compare {
        /// Baseline attempt JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current attempt JSON
        #[arg(long)]
        current: PathBuf,

        /// Exit code 1 if a previously correct answer is now wrong
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a band table, or the band for a score
    Bands {
        /// Built-in table name or .toml file
        #[arg(long, default_value = "academic-reading")]
        table: String,

        /// Correct answers to look up
        #[arg(long, requires = "total")]
        correct: Option<u32>,

        /// Questions in the test
        #[arg(long, requires = "correct")]
        total: Option<u32>,
    },

    /// Transcribe and evaluate a speaking answer
    Speak {
        /// Recording of the answer
        #[arg(long)]
        audio: PathBuf,

        /// The question or cue card being answered
        #[arg(long)]
        topic: String,

        /// Recording length, e.g. "120" or "2m" (default: 2m)
        #[arg(long, default_value = "2m")]
        duration: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and example answer key
    Init,
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bandcheck=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            key,
            answers,
            time,
            band_table,
            strict,
            format,
            save,
            output,
            config,
        } => {
            commands::score::execute(commands::score::ScoreArgs {
                key,
                answers,
                time,
                band_table,
                strict,
                format,
                save,
                output,
                config,
            })
            .await
        }
        Commands::Validate { key } => commands::validate::execute(key),
        Commands::Compare {
            baseline,
            current,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, fail_on_regression, format),
        Commands::Bands {
            table,
            correct,
            total,
        } => commands::bands::execute(table, correct, total),
        Commands::Speak {
            audio,
            topic,
            duration,
            format,
            config,
        } => commands::speak::execute(audio, topic, duration, format, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
