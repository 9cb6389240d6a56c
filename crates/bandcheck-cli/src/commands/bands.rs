//! The `bandcheck bands` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::resolve_band_table;

pub fn execute(table_spec: String, correct: Option<u32>, total: Option<u32>) -> Result<()> {
    let table = resolve_band_table(&table_spec)?;

    if let (Some(correct), Some(total)) = (correct, total) {
        if correct > total {
            anyhow::bail!("--correct ({correct}) cannot exceed --total ({total})");
        }
        println!(
            "{correct}/{total} on {}: band {}",
            table.name,
            table.band_for(correct, total)
        );
        return Ok(());
    }

    let mut out = Table::new();
    out.set_header(vec!["Correct answers", "Band"]);

    let steps = table.steps();
    for (i, step) in steps.iter().enumerate().rev() {
        let upper = steps
            .get(i + 1)
            .map(|next| next.min_correct - 1)
            .unwrap_or(table.reference_total);
        let range = if upper == step.min_correct {
            step.min_correct.to_string()
        } else {
            format!("{}-{}", step.min_correct, upper)
        };
        out.add_row(vec![Cell::new(range), Cell::new(step.band)]);
    }

    println!("{} (out of {})", table.name, table.reference_total);
    println!("{out}");
    Ok(())
}
