//! The `bandcheck score` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Color, Table};

use bandcheck_core::band::BandTable;
use bandcheck_core::engine::PracticeEngine;
use bandcheck_core::matcher::Matcher;
use bandcheck_core::model::AnswerKey;
use bandcheck_core::parser::{find_key, load_answer_set, parse_answer_key};
use bandcheck_core::report::AttemptReport;
use bandcheck_providers::{create_evaluator, create_store, create_transcriber, load_config_from};
use bandcheck_report::write_html_report;

use super::{parse_duration, resolve_band_table};

pub struct ScoreArgs {
    pub key: String,
    pub answers: PathBuf,
    pub time: String,
    pub band_table: Option<String>,
    pub strict: bool,
    pub format: String,
    pub save: Option<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: ScoreArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let key = load_key(&args.key, &config.answer_keys_dir)?;
    let answers = load_answer_set(&args.answers)?;
    let time_taken = parse_duration(&args.time)?;
    let table = match &args.band_table {
        Some(spec) => resolve_band_table(spec)?,
        None => BandTable::for_module(key.module),
    };
    let matcher = if args.strict {
        Matcher::strict()
    } else {
        Matcher::new(config.matching.clone())
    };

    // Scoring never talks to the speaking collaborators
    let engine = PracticeEngine::new(
        create_transcriber(None)?,
        create_evaluator(None)?,
        create_store(config.store.as_ref())?,
    )
    .with_matcher(matcher)
    .with_band_table(table.clone());

    let submission = engine.submit_test(&key, &answers, time_taken).await;
    let report = AttemptReport::from_submission(&key, &submission);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_results(&report),
    }

    if !submission.saved.success {
        eprintln!(
            "Warning: score was not saved: {}",
            submission.saved.error.as_deref().unwrap_or("unknown error")
        );
    }
    if !report.result.ignored.is_empty() {
        eprintln!(
            "Ignored answers for unknown questions: {}",
            report.result.ignored.join(", ")
        );
    }

    if let Some(save) = &args.save {
        let output = args.output.unwrap_or(config.output_dir);
        save_outputs(&report, &table, save, &output)?;
    }

    Ok(())
}

/// A path to a `.toml` key, or a key id searched for under `keys_dir`.
fn load_key(key: &str, keys_dir: &Path) -> Result<AnswerKey> {
    let path = Path::new(key);
    if path.exists() || path.extension().is_some_and(|ext| ext == "toml") {
        parse_answer_key(path)
    } else {
        tracing::debug!("looking up answer key '{key}' under {}", keys_dir.display());
        find_key(keys_dir, key)
    }
}

fn print_results(report: &AttemptReport) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Your answer", "Correct answer", "Result"]);

    for o in &report.result.outcomes {
        let (mark, color) = if o.correct {
            ("✓", Color::Green)
        } else {
            ("✗", Color::Red)
        };
        table.add_row(vec![
            Cell::new(&o.question_id),
            Cell::new(o.given.as_deref().unwrap_or("-")),
            Cell::new(&o.expected),
            Cell::new(mark).fg(color),
        ]);
    }

    println!("{}\n", report.test.name);
    println!("{table}\n");
    println!(
        "Score: {}/{} ({}%)  Band: {}",
        report.result.correct, report.result.total, report.result.percentage, report.band
    );
}

fn save_outputs(
    report: &AttemptReport,
    table: &BandTable,
    formats: &str,
    output: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output)?;
    let stem = format!(
        "{}-{}",
        report.test.id,
        report.created_at.format("%Y-%m-%dT%H%M%S")
    );

    let formats: Vec<&str> = if formats == "all" {
        vec!["json", "html"]
    } else {
        formats.split(',').map(str::trim).collect()
    };

    for fmt in formats {
        match fmt {
            "json" => {
                let path = output.join(format!("{stem}.json"));
                report.save_json(&path)?;
                eprintln!("Attempt saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("{stem}.html"));
                write_html_report(report, table, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            other => eprintln!("Unknown format: {other}"),
        }
    }
    Ok(())
}
