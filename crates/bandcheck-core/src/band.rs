//! Raw-score to band conversion.
//!
//! A band table is an ordered step function from correct-answer count to an
//! IELTS band. The built-in tables follow the published conversion tables for
//! a 40-question paper.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TestModule;

/// An IELTS band from 0.0 to 9.0 in half-band steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Band(u8);

impl Band {
    pub const MIN: Band = Band(0);
    pub const MAX: Band = Band(18);

    /// Snap a numeric band to the nearest half band. `None` outside 0–9.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=9.0).contains(&value) {
            return None;
        }
        Some(Band((value * 2.0).round() as u8))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f64())
    }
}

impl From<Band> for f64 {
    fn from(band: Band) -> Self {
        band.as_f64()
    }
}

impl TryFrom<f64> for Band {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Band::from_f64(value).ok_or_else(|| format!("band out of range: {value}"))
    }
}

/// One step: `min_correct` or more correct answers earn `band`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandStep {
    pub min_correct: u32,
    pub band: Band,
}

/// Problems found when building a band table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BandTableError {
    #[error("band table has no steps")]
    Empty,

    #[error("reference total must be at least 1")]
    ZeroReference,

    #[error("duplicate threshold {0}")]
    DuplicateThreshold(u32),

    #[error("band drops from {previous} to {band} at threshold {min_correct}")]
    BandDecreases {
        min_correct: u32,
        previous: Band,
        band: Band,
    },

    #[error("threshold {min_correct} exceeds reference total {reference_total}")]
    ThresholdExceedsTotal {
        min_correct: u32,
        reference_total: u32,
    },
}

/// A validated, monotone step function from correct count to band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBandTable")]
pub struct BandTable {
    pub name: String,
    /// Number of questions the thresholds are written for.
    pub reference_total: u32,
    steps: Vec<BandStep>,
}

#[derive(Deserialize)]
struct RawBandTable {
    name: String,
    #[serde(default = "default_reference_total")]
    reference_total: u32,
    steps: Vec<BandStep>,
}

fn default_reference_total() -> u32 {
    40
}

impl TryFrom<RawBandTable> for BandTable {
    type Error = BandTableError;

    fn try_from(raw: RawBandTable) -> Result<Self, Self::Error> {
        BandTable::new(raw.name, raw.reference_total, raw.steps)
    }
}

impl BandTable {
    /// Build a table. Steps may come in any order; they are sorted by threshold.
    pub fn new(
        name: impl Into<String>,
        reference_total: u32,
        mut steps: Vec<BandStep>,
    ) -> Result<Self, BandTableError> {
        if reference_total == 0 {
            return Err(BandTableError::ZeroReference);
        }
        if steps.is_empty() {
            return Err(BandTableError::Empty);
        }
        steps.sort_by_key(|s| s.min_correct);

        for pair in steps.windows(2) {
            if pair[0].min_correct == pair[1].min_correct {
                return Err(BandTableError::DuplicateThreshold(pair[1].min_correct));
            }
            if pair[1].band < pair[0].band {
                return Err(BandTableError::BandDecreases {
                    min_correct: pair[1].min_correct,
                    previous: pair[0].band,
                    band: pair[1].band,
                });
            }
        }
        if let Some(last) = steps.last() {
            if last.min_correct > reference_total {
                return Err(BandTableError::ThresholdExceedsTotal {
                    min_correct: last.min_correct,
                    reference_total,
                });
            }
        }

        Ok(Self {
            name: name.into(),
            reference_total,
            steps,
        })
    }

    /// Steps in ascending threshold order.
    pub fn steps(&self) -> &[BandStep] {
        &self.steps
    }

    /// Band for `correct` out of `total`.
    ///
    /// `correct` is clamped to `total`. When `total` differs from the
    /// reference total the count is scaled down to the reference first.
    /// Counts below the lowest threshold earn band 0.0.
    pub fn band_for(&self, correct: u32, total: u32) -> Band {
        let correct = correct.min(total);
        let scaled = if total == 0 || total == self.reference_total {
            correct
        } else {
            (u64::from(correct) * u64::from(self.reference_total) / u64::from(total)) as u32
        };

        self.steps
            .iter()
            .rev()
            .find(|s| s.min_correct <= scaled)
            .map(|s| s.band)
            .unwrap_or(Band::MIN)
    }

    /// Highest band the table can award.
    pub fn max_band(&self) -> Band {
        self.steps.last().map(|s| s.band).unwrap_or(Band::MIN)
    }

    pub fn listening() -> Self {
        builtin("listening", LISTENING)
    }

    pub fn academic_reading() -> Self {
        builtin("academic-reading", ACADEMIC_READING)
    }

    pub fn general_reading() -> Self {
        builtin("general-reading", GENERAL_READING)
    }

    /// Default table for a paper.
    pub fn for_module(module: TestModule) -> Self {
        match module {
            TestModule::Listening => Self::listening(),
            TestModule::AcademicReading => Self::academic_reading(),
            TestModule::GeneralReading => Self::general_reading(),
        }
    }

    /// Look up a built-in table by name.
    pub fn builtin(name: &str) -> Option<Self> {
        name.parse::<TestModule>().ok().map(Self::for_module)
    }

    /// Parse a table from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse band table")
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read band table: {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// Band for `correct` out of `total` using `table`.
pub fn band_for_score(correct: u32, total: u32, table: &BandTable) -> Band {
    table.band_for(correct, total)
}

// (min_correct, band in half steps)
const LISTENING: &[(u32, u8)] = &[
    (1, 2),
    (2, 4),
    (4, 5),
    (6, 6),
    (8, 7),
    (10, 8),
    (13, 9),
    (16, 10),
    (18, 11),
    (23, 12),
    (26, 13),
    (30, 14),
    (32, 15),
    (35, 16),
    (37, 17),
    (39, 18),
];

const ACADEMIC_READING: &[(u32, u8)] = &[
    (1, 2),
    (2, 4),
    (4, 5),
    (6, 6),
    (8, 7),
    (10, 8),
    (13, 9),
    (15, 10),
    (19, 11),
    (23, 12),
    (27, 13),
    (30, 14),
    (33, 15),
    (35, 16),
    (37, 17),
    (39, 18),
];

const GENERAL_READING: &[(u32, u8)] = &[
    (1, 2),
    (3, 4),
    (6, 5),
    (9, 6),
    (12, 7),
    (15, 8),
    (19, 9),
    (23, 10),
    (27, 11),
    (30, 12),
    (32, 13),
    (34, 14),
    (36, 15),
    (37, 16),
    (39, 17),
    (40, 18),
];

fn builtin(name: &str, rows: &[(u32, u8)]) -> BandTable {
    BandTable {
        name: name.to_string(),
        reference_total: 40,
        steps: rows
            .iter()
            .map(|&(min_correct, half_steps)| BandStep {
                min_correct,
                band: Band(half_steps),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(v: f64) -> Band {
        Band::from_f64(v).unwrap()
    }

    #[test]
    fn band_snapping_and_display() {
        assert_eq!(band(6.5).to_string(), "6.5");
        assert_eq!(band(6.74).to_string(), "6.5");
        assert_eq!(band(6.76).to_string(), "7.0");
        assert!(Band::from_f64(9.5).is_none());
        assert!(Band::from_f64(-1.0).is_none());
        assert!(Band::from_f64(f64::NAN).is_none());
    }

    #[test]
    fn builtin_tables_are_valid() {
        for table in [
            BandTable::listening(),
            BandTable::academic_reading(),
            BandTable::general_reading(),
        ] {
            let rebuilt = BandTable::new(table.name.clone(), 40, table.steps().to_vec());
            assert_eq!(rebuilt, Ok(table.clone()), "table {} invalid", table.name);
            assert_eq!(table.max_band(), Band::MAX);
        }
    }

    #[test]
    fn full_marks_is_band_nine() {
        for table in [
            BandTable::listening(),
            BandTable::academic_reading(),
            BandTable::general_reading(),
        ] {
            assert_eq!(table.band_for(40, 40), Band::MAX);
        }
    }

    #[test]
    fn known_conversions() {
        let reading = BandTable::academic_reading();
        assert_eq!(reading.band_for(30, 40), band(7.0));
        assert_eq!(reading.band_for(29, 40), band(6.5));
        assert_eq!(reading.band_for(23, 40), band(6.0));
        assert_eq!(reading.band_for(7, 40), band(3.0));
        assert_eq!(reading.band_for(0, 40), Band::MIN);

        let listening = BandTable::listening();
        assert_eq!(listening.band_for(32, 40), band(7.5));
        assert_eq!(listening.band_for(18, 40), band(5.5));
    }

    #[test]
    fn monotone_over_whole_domain() {
        for table in [
            BandTable::listening(),
            BandTable::academic_reading(),
            BandTable::general_reading(),
        ] {
            for total in [10u32, 13, 40] {
                let mut previous = Band::MIN;
                for correct in 0..=total {
                    let b = band_for_score(correct, total, &table);
                    assert!(b >= previous, "{} dropped at {correct}/{total}", table.name);
                    previous = b;
                }
            }
        }
    }

    #[test]
    fn scales_other_totals_and_clamps() {
        let reading = BandTable::academic_reading();
        // 5/10 scales to 20/40
        assert_eq!(reading.band_for(5, 10), reading.band_for(20, 40));
        assert_eq!(reading.band_for(10, 10), Band::MAX);
        assert_eq!(reading.band_for(55, 40), Band::MAX);
        assert_eq!(reading.band_for(0, 0), Band::MIN);
    }

    #[test]
    fn rejects_bad_tables() {
        let step = |min_correct, b: f64| BandStep {
            min_correct,
            band: band(b),
        };
        assert_eq!(BandTable::new("x", 40, vec![]), Err(BandTableError::Empty));
        assert_eq!(
            BandTable::new("x", 0, vec![step(1, 1.0)]),
            Err(BandTableError::ZeroReference)
        );
        assert!(matches!(
            BandTable::new("x", 40, vec![step(10, 5.0), step(20, 4.0)]),
            Err(BandTableError::BandDecreases { min_correct: 20, .. })
        ));
        assert_eq!(
            BandTable::new("x", 40, vec![step(10, 5.0), step(10, 6.0)]),
            Err(BandTableError::DuplicateThreshold(10))
        );
        assert!(matches!(
            BandTable::new("x", 20, vec![step(25, 9.0)]),
            Err(BandTableError::ThresholdExceedsTotal { .. })
        ));
    }

    #[test]
    fn parse_custom_table() {
        let toml = r#"
name = "mini"
reference_total = 10
steps = [
    { min_correct = 9, band = 9.0 },
    { min_correct = 5, band = 6.0 },
    { min_correct = 1, band = 3.5 },
]
"#;
        let table = BandTable::from_toml_str(toml).unwrap();
        assert_eq!(table.steps()[0].min_correct, 1);
        assert_eq!(table.band_for(6, 10), band(6.0));
        assert_eq!(table.band_for(9, 10), band(9.0));

        let bad = "name = \"bad\"\nsteps = [ { min_correct = 50, band = 9.0 } ]";
        assert!(BandTable::from_toml_str(bad).is_err());
    }

    #[test]
    fn builtin_lookup_by_name() {
        assert_eq!(BandTable::builtin("listening").unwrap().name, "listening");
        assert_eq!(
            BandTable::builtin("general").unwrap().name,
            "general-reading"
        );
        assert!(BandTable::builtin("speaking").is_none());
    }
}
