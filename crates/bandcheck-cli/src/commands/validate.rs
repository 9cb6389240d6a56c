//! The `bandcheck validate` command.

use std::path::PathBuf;

use anyhow::Result;

use bandcheck_core::parser::{check_answer_key_file, load_key_directory, validate_answer_key};

pub fn execute(key_path: PathBuf) -> Result<()> {
    let checked = if key_path.is_dir() {
        load_key_directory(&key_path)?
            .into_iter()
            .map(|key| {
                let warnings = validate_answer_key(&key);
                (key, warnings)
            })
            .collect()
    } else {
        vec![check_answer_key_file(&key_path)?]
    };

    if checked.is_empty() {
        anyhow::bail!("no answer keys found in {}", key_path.display());
    }

    let mut total_warnings = 0;

    for (key, warnings) in &checked {
        println!(
            "Answer key: {} [{}] ({} questions)",
            key.name,
            key.module,
            key.total()
        );

        for w in warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All answer keys valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
