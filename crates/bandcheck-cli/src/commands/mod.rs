pub mod bands;
pub mod compare;
pub mod init;
pub mod score;
pub mod speak;
pub mod validate;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use bandcheck_core::band::BandTable;

/// Parse "90", "90s", "58m", or "1h2m30s".
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => anyhow::bail!("invalid duration '{input}': unexpected '{c}'"),
        };
        let value: u64 = digits
            .parse()
            .with_context(|| format!("invalid duration '{input}': missing number before '{c}'"))?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .with_context(|| format!("invalid duration '{input}': too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        anyhow::bail!("invalid duration '{input}': trailing number without unit");
    }
    Ok(Duration::from_secs(total))
}

/// A built-in table name, or a path to a TOML table.
pub fn resolve_band_table(spec: &str) -> Result<BandTable> {
    if let Some(table) = BandTable::builtin(spec) {
        return Ok(table);
    }
    let path = Path::new(spec);
    if path.exists() {
        return BandTable::load(path);
    }
    anyhow::bail!(
        "unknown band table '{spec}' (expected listening, academic-reading, general-reading, or a .toml file)"
    )
}
