//! The `bandcheck compare` command.

use std::path::PathBuf;

use anyhow::Result;

use bandcheck_core::report::AttemptReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = AttemptReport::load_json(&baseline_path)?;
    let current = AttemptReport::load_json(&current_path)?;

    let report = current.compare(&baseline);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            if !report.same_test {
                println!(
                    "Note: attempts are for different tests ({} vs {})",
                    baseline.test.id, current.test.id
                );
            }
            println!(
                "{}: {} -> {} correct, band {} -> {} ({:+.1})",
                report.test_id,
                report.baseline_correct,
                report.current_correct,
                report.baseline_band,
                report.current_band,
                report.band_delta()
            );
            println!(
                "{} newly correct, {} newly wrong, {} unchanged",
                report.newly_correct.len(),
                report.newly_wrong.len(),
                report.unchanged
            );

            if !report.newly_wrong.is_empty() {
                println!("\nNewly wrong: {}", report.newly_wrong.join(", "));
            }
            if !report.newly_correct.is_empty() {
                println!("\nNewly correct: {}", report.newly_correct.join(", "));
            }

            if report.new_questions > 0 {
                println!("\n{} new question(s)", report.new_questions);
            }
            if report.removed_questions > 0 {
                println!("{} removed question(s)", report.removed_questions);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
