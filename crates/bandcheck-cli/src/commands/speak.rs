//! The `bandcheck speak` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use bandcheck_core::engine::{PracticeEngine, SpeakingReport, SpeakingSubmission};
use bandcheck_core::feedback::EvaluationOutcome;
use bandcheck_core::traits::AudioClip;
use bandcheck_providers::{create_evaluator, create_store, create_transcriber, load_config_from};

use super::parse_duration;

pub async fn execute(
    audio: PathBuf,
    topic: String,
    duration: String,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    if config.transcriber.is_none() || config.evaluator.is_none() {
        anyhow::bail!(
            "speaking needs [transcriber] and [evaluator] sections in bandcheck.toml (or BANDCHECK_OPENAI_KEY)"
        );
    }

    let bytes = std::fs::read(&audio)
        .with_context(|| format!("failed to read recording: {}", audio.display()))?;
    let file_name = audio
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "answer.webm".to_string());
    let duration_secs = u32::try_from(parse_duration(&duration)?.as_secs())
        .context("recording duration is too long")?;

    let engine = PracticeEngine::new(
        create_transcriber(config.transcriber.as_ref())?,
        create_evaluator(config.evaluator.as_ref())?,
        create_store(config.store.as_ref())?,
    );

    let submission = SpeakingSubmission {
        topic,
        clip: AudioClip::new(bytes, file_name),
        duration_secs,
    };
    tracing::info!(
        "evaluating {} ({} bytes, {duration_secs}s)",
        submission.clip.file_name,
        submission.clip.bytes.len()
    );
    let report = engine.evaluate_speaking(&submission).await;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    if !report.saved.success {
        eprintln!(
            "Warning: result was not saved: {}",
            report.saved.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn print_report(report: &SpeakingReport) {
    println!("Topic: {}\n", report.topic);
    println!("Transcript:\n  {}\n", report.transcript);

    match &report.outcome {
        EvaluationOutcome::Structured(eval) => {
            match eval.effective_band() {
                Some(band) => println!("Overall band: {band}"),
                None => println!("Overall band: not given"),
            }

            let criteria = [
                ("Fluency and coherence", eval.criteria.fluency_coherence),
                ("Lexical resource", eval.criteria.lexical_resource),
                ("Grammatical range", eval.criteria.grammatical_range),
                ("Pronunciation", eval.criteria.pronunciation),
            ];
            for (label, band) in criteria {
                if let Some(band) = band {
                    println!("  {label}: {band}");
                }
            }

            if let Some(feedback) = &eval.feedback {
                println!("\n{feedback}");
            }
            if !eval.strengths.is_empty() {
                println!("\nStrengths:");
                for s in &eval.strengths {
                    println!("  - {s}");
                }
            }
            if !eval.improvements.is_empty() {
                println!("\nTo improve:");
                for s in &eval.improvements {
                    println!("  - {s}");
                }
            }
        }
        EvaluationOutcome::Raw(text) => {
            println!("Feedback:\n{text}");
        }
        EvaluationOutcome::Unavailable(reason) => {
            println!("Evaluation unavailable: {reason}");
        }
    }
}
