//! Attempt reports with JSON persistence and progress tracking.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::band::Band;
use crate::engine::Submission;
use crate::model::{AnswerKey, TestModule};
use crate::scoring::ScoreResult;
use crate::traits::SaveOutcome;

/// A complete record of one practice attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the attempt was scored.
    pub created_at: DateTime<Utc>,
    /// Summary of the test taken.
    pub test: TestSummary,
    /// Per-question outcomes and totals.
    pub result: ScoreResult,
    pub band: Band,
    /// Time spent on the test in seconds.
    pub time_taken_secs: u64,
    /// Whether the score reached the store, if one was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<SaveOutcome>,
}

/// Summary of an answer key (without the answers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub id: String,
    pub name: String,
    pub module: TestModule,
    pub question_count: usize,
}

impl From<&AnswerKey> for TestSummary {
    fn from(key: &AnswerKey) -> Self {
        Self {
            id: key.id.clone(),
            name: key.name.clone(),
            module: key.module,
            question_count: key.total(),
        }
    }
}

impl AttemptReport {
    pub fn new(key: &AnswerKey, result: ScoreResult, band: Band, time_taken_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            test: TestSummary::from(key),
            result,
            band,
            time_taken_secs,
            saved: None,
        }
    }

    /// Build a report from a pipeline submission.
    pub fn from_submission(key: &AnswerKey, submission: &Submission) -> Self {
        Self {
            saved: Some(submission.saved.clone()),
            ..Self::new(
                key,
                submission.result.clone(),
                submission.band,
                submission.time_taken_secs,
            )
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AttemptReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this attempt against an earlier one, question by question.
    pub fn compare(&self, baseline: &AttemptReport) -> ProgressReport {
        let outcome_map = |report: &AttemptReport| -> HashMap<String, bool> {
            report
                .result
                .outcomes
                .iter()
                .map(|o| (o.question_id.clone(), o.correct))
                .collect()
        };

        let baseline_outcomes = outcome_map(baseline);
        let current_outcomes = outcome_map(self);

        let mut newly_correct = Vec::new();
        let mut newly_wrong = Vec::new();
        let mut unchanged = 0usize;
        let mut new_questions = 0usize;

        for outcome in &self.result.outcomes {
            match baseline_outcomes.get(&outcome.question_id) {
                Some(&before) if before == outcome.correct => unchanged += 1,
                Some(_) if outcome.correct => newly_correct.push(outcome.question_id.clone()),
                Some(_) => newly_wrong.push(outcome.question_id.clone()),
                None => new_questions += 1,
            }
        }

        let removed_questions = baseline_outcomes
            .keys()
            .filter(|k| !current_outcomes.contains_key(*k))
            .count();

        ProgressReport {
            test_id: self.test.id.clone(),
            same_test: self.test.id == baseline.test.id,
            baseline_correct: baseline.result.correct,
            current_correct: self.result.correct,
            baseline_band: baseline.band,
            current_band: self.band,
            newly_correct,
            newly_wrong,
            unchanged,
            new_questions,
            removed_questions,
        }
    }
}

/// Result of comparing two attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub test_id: String,
    /// False when the two attempts were scored against different keys.
    pub same_test: bool,
    pub baseline_correct: u32,
    pub current_correct: u32,
    pub baseline_band: Band,
    pub current_band: Band,
    /// Questions wrong in the baseline and right now.
    pub newly_correct: Vec<String>,
    /// Questions right in the baseline and wrong now.
    pub newly_wrong: Vec<String>,
    pub unchanged: usize,
    /// Questions in current but not baseline.
    pub new_questions: usize,
    /// Questions in baseline but not current.
    pub removed_questions: usize,
}

impl ProgressReport {
    /// Band change in band points (e.g. `0.5`, `-1.0`).
    pub fn band_delta(&self) -> f64 {
        self.current_band.as_f64() - self.baseline_band.as_f64()
    }

    /// Returns true if any previously correct question is now wrong.
    pub fn has_regressions(&self) -> bool {
        !self.newly_wrong.is_empty()
    }

    /// Format the progress report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        if !self.same_test {
            md.push_str("> **Note:** attempts were scored against different answer keys.\n\n");
        }

        md.push_str(&format!(
            "**Summary:** {} → {} correct, band {} → {} ({:+.1})\n\n",
            self.baseline_correct,
            self.current_correct,
            self.baseline_band,
            self.current_band,
            self.band_delta()
        ));

        md.push_str(&format!(
            "{} newly correct, {} newly wrong, {} unchanged\n\n",
            self.newly_correct.len(),
            self.newly_wrong.len(),
            self.unchanged
        ));

        if !self.newly_wrong.is_empty() {
            md.push_str("### Newly wrong\n\n");
            md.push_str(&format!("{}\n\n", self.newly_wrong.join(", ")));
        }

        if !self.newly_correct.is_empty() {
            md.push_str("### Newly correct\n\n");
            md.push_str(&format!("{}\n", self.newly_correct.join(", ")));
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerSet;
    use crate::scoring::compute_score;

    fn key(id: &str) -> AnswerKey {
        AnswerKey::from_entries(
            id,
            "Sample",
            TestModule::AcademicReading,
            [("1", "TRUE"), ("2", "B"), ("3", "irrigation"), ("4", "C")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
            vec![],
        )
    }

    fn attempt(key: &AnswerKey, pairs: &[(&str, &str)], band: f64) -> AttemptReport {
        let answers: AnswerSet = pairs.iter().copied().collect();
        AttemptReport::new(
            key,
            compute_score(&answers, key),
            Band::from_f64(band).unwrap(),
            1200,
        )
    }

    #[test]
    fn compare_identical_attempts() {
        let key = key("sample");
        let a = attempt(&key, &[("1", "true"), ("2", "b")], 5.0);
        let report = a.compare(&a.clone());
        assert!(report.newly_correct.is_empty());
        assert!(report.newly_wrong.is_empty());
        assert_eq!(report.unchanged, 4);
        assert_eq!(report.band_delta(), 0.0);
        assert!(report.same_test);
    }

    #[test]
    fn compare_with_progress_and_regression() {
        let key = key("sample");
        let baseline = attempt(&key, &[("1", "true"), ("2", "a")], 5.0);
        let current = attempt(&key, &[("1", "false"), ("2", "b"), ("3", "irrigation")], 6.5);

        let report = current.compare(&baseline);
        assert_eq!(report.newly_correct, vec!["2".to_string(), "3".to_string()]);
        assert_eq!(report.newly_wrong, vec!["1".to_string()]);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.band_delta(), 1.5);
        assert!(report.has_regressions());
    }

    #[test]
    fn compare_across_keys() {
        let baseline = attempt(&key("a"), &[], 3.0);
        let other = AnswerKey::from_entries(
            "b",
            "Other",
            TestModule::Listening,
            [("1".to_string(), "TRUE".to_string()), ("5".to_string(), "D".to_string())],
            vec![],
        );
        let current = attempt(&other, &[], 3.0);

        let report = current.compare(&baseline);
        assert!(!report.same_test);
        assert_eq!(report.new_questions, 1);
        assert_eq!(report.removed_questions, 3);
        assert!(report.to_markdown().contains("different answer keys"));
    }

    #[test]
    fn json_roundtrip() {
        let key = key("sample");
        let report = attempt(&key, &[("1", "TRUE")], 4.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("attempt.json");

        report.save_json(&path).unwrap();
        let loaded = AttemptReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.test, report.test);
        assert_eq!(loaded.result, report.result);
        assert_eq!(loaded.band, report.band);
        assert!(loaded.saved.is_none());
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        assert!(AttemptReport::load_json(&path).is_err());
        assert!(AttemptReport::load_json(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn markdown_output() {
        let key = key("sample");
        let baseline = attempt(&key, &[("1", "true")], 4.0);
        let current = attempt(&key, &[("2", "b")], 4.0);
        let md = current.compare(&baseline).to_markdown();
        assert!(md.contains("### Newly wrong"));
        assert!(md.contains("### Newly correct"));
        assert!(md.contains("band 4.0 → 4.0 (+0.0)"));
    }
}
