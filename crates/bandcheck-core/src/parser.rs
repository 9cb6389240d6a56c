//! TOML answer-key parser.
//!
//! Loads answer keys from TOML files and directories, validates them, and
//! reads learner answer files.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    question_number, AnswerKey, AnswerKind, AnswerSet, CanonicalAnswer, KindRange, TestModule,
};

/// Intermediate TOML structure for answer-key files.
#[derive(Debug, Deserialize)]
struct TomlKeyFile {
    test: TomlTestHeader,
    #[serde(default)]
    ranges: Vec<TomlRange>,
    #[serde(default)]
    answers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TomlTestHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_module_str")]
    module: String,
}

fn default_module_str() -> String {
    "academic-reading".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlRange {
    first: u32,
    last: u32,
    kind: String,
}

/// Parse a single TOML file into an `AnswerKey`.
pub fn parse_answer_key(path: &Path) -> Result<AnswerKey> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer key file: {}", path.display()))?;

    parse_answer_key_str(&content, path)
}

/// Parse a TOML string into an `AnswerKey` (useful for testing).
pub fn parse_answer_key_str(content: &str, source_path: &Path) -> Result<AnswerKey> {
    let parsed: TomlKeyFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let module: TestModule = parsed
        .test
        .module
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{}", e))?;

    let ranges = parsed
        .ranges
        .into_iter()
        .map(|r| {
            if r.first > r.last {
                anyhow::bail!("range {}-{} is reversed", r.first, r.last);
            }
            let kind = r.kind.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?;
            Ok(KindRange {
                first: r.first,
                last: r.last,
                kind,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(bad) = parsed.answers.keys().find(|id| question_number(id).is_none()) {
        anyhow::bail!(
            "answer id '{}' does not start with a question number: {}",
            bad,
            source_path.display()
        );
    }

    let mut key = AnswerKey::from_entries(
        parsed.test.id,
        parsed.test.name,
        module,
        parsed.answers,
        ranges,
    );
    key.description = parsed.test.description;
    Ok(key)
}

/// Recursively load all `.toml` answer-key files from a directory.
pub fn load_key_directory(dir: &Path) -> Result<Vec<AnswerKey>> {
    let mut keys = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            keys.extend(load_key_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_answer_key(&path) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    keys.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(keys)
}

/// Find a key by id in a directory tree.
pub fn find_key(dir: &Path, id: &str) -> Result<AnswerKey> {
    load_key_directory(dir)?
        .into_iter()
        .find(|k| k.id == id)
        .with_context(|| format!("no answer key with id '{}' under {}", id, dir.display()))
}

/// A warning from answer-key validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a loaded key for common authoring mistakes.
pub fn validate_answer_key(key: &AnswerKey) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if key.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "answer key has no questions".into(),
        });
    }

    for question in &key.questions {
        match &question.answer {
            CanonicalAnswer::Composite(parts) => {
                if parts.len() == 1 {
                    warnings.push(ValidationWarning::question(
                        &question.id,
                        format!("composite question has a single part ({})", parts[0].id),
                    ));
                }
                for part in parts {
                    check_accepted(&part.id, question.kind, part.answer.accepted(), &mut warnings);
                }
            }
            answer => check_accepted(&question.id, question.kind, answer.accepted(), &mut warnings),
        }
    }

    // Ranges that no question falls into are usually typos
    for range in &key.ranges {
        let covers_any = key
            .questions
            .iter()
            .filter_map(|q| question_number(&q.id))
            .any(|n| range.contains(n));
        if !covers_any {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "range {}-{} ({}) covers no question",
                    range.first, range.last, range.kind
                ),
            });
        }
    }

    for (i, a) in key.ranges.iter().enumerate() {
        for b in &key.ranges[i + 1..] {
            if a.first <= b.last && b.first <= a.last {
                warnings.push(ValidationWarning {
                    question_id: None,
                    message: format!(
                        "ranges {}-{} and {}-{} overlap; the first one wins",
                        a.first, a.last, b.first, b.last
                    ),
                });
            }
        }
    }

    warnings
}

fn check_accepted(
    id: &str,
    kind: AnswerKind,
    accepted: &[String],
    warnings: &mut Vec<ValidationWarning>,
) {
    if accepted.iter().all(|a| a.trim().is_empty()) {
        warnings.push(ValidationWarning::question(id, "answer is empty"));
        return;
    }
    if kind.is_categorical() {
        for alt in accepted.iter().filter(|a| !kind.accepts_value(a)) {
            warnings.push(ValidationWarning::question(
                id,
                format!("'{alt}' is not a valid {kind} answer"),
            ));
        }
    }
}

/// Parse and validate a key file, including checks that need the raw text.
pub fn check_answer_key_file(path: &Path) -> Result<(AnswerKey, Vec<ValidationWarning>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer key file: {}", path.display()))?;
    let key = parse_answer_key_str(&content, path)?;
    let mut warnings = validate_answer_key(&key);

    // Re-read the raw entries: empty alternatives are dropped once parsed
    let raw: TomlKeyFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    for (id, answer) in &raw.answers {
        if answer.contains('/') && answer.split('/').any(|alt| alt.trim().is_empty()) {
            warnings.push(ValidationWarning::question(
                id,
                format!("'{answer}' has an empty alternative"),
            ));
        }
    }

    Ok((key, warnings))
}

/// Load a learner's answers from a JSON or TOML map of id → answer.
///
/// Values that are not strings are dropped.
pub fn load_answer_set(path: &Path) -> Result<AnswerSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file: {}", path.display()))?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let answers: AnswerSet = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON: {}", path.display()))?
    };

    tracing::debug!("loaded {} answers from {}", answers.len(), path.display());
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE_TOML: &str = r#"
[test]
id = "sample-reading"
name = "Sample Reading"
description = "A short sample"
module = "academic-reading"

[[ranges]]
first = 1
last = 2
kind = "tfng"

[[ranges]]
first = 3
last = 3
kind = "choice"

[answers]
"1" = "TRUE"
"2" = "NOT GIVEN"
"3" = "B"
"4" = "mosquito/mosquitos/mosquitoes"
"5a" = "books"
"5b" = "activities"
"#;

    fn path() -> PathBuf {
        PathBuf::from("sample.toml")
    }

    #[test]
    fn parse_sample_key() {
        let key = parse_answer_key_str(SAMPLE_TOML, &path()).unwrap();
        assert_eq!(key.id, "sample-reading");
        assert_eq!(key.description, "A short sample");
        assert_eq!(key.module, TestModule::AcademicReading);
        assert_eq!(key.total(), 5);
        assert_eq!(key.question("2").unwrap().kind, AnswerKind::TrueFalseNotGiven);
        assert_eq!(key.question("3").unwrap().kind, AnswerKind::Choice);
        assert_eq!(key.question("4").unwrap().kind, AnswerKind::Word);
        assert!(matches!(
            key.question("5").unwrap().answer,
            CanonicalAnswer::Composite(_)
        ));
        assert!(validate_answer_key(&key).is_empty());
    }

    #[test]
    fn module_defaults_to_academic() {
        let toml = "[test]\nid = \"x\"\nname = \"X\"\n\n[answers]\n\"1\" = \"A\"\n";
        let key = parse_answer_key_str(toml, &path()).unwrap();
        assert_eq!(key.module, TestModule::AcademicReading);
    }

    #[test]
    fn rejects_bad_input() {
        let missing_header = "[answers]\n\"1\" = \"A\"\n";
        assert!(parse_answer_key_str(missing_header, &path()).is_err());

        let bad_kind = "[test]\nid = \"x\"\nname = \"X\"\n\n[[ranges]]\nfirst = 1\nlast = 2\nkind = \"essay\"\n";
        assert!(parse_answer_key_str(bad_kind, &path()).is_err());

        let reversed = "[test]\nid = \"x\"\nname = \"X\"\n\n[[ranges]]\nfirst = 5\nlast = 2\nkind = \"tfng\"\n";
        assert!(parse_answer_key_str(reversed, &path()).is_err());

        let bad_id = "[test]\nid = \"x\"\nname = \"X\"\n\n[answers]\nq1 = \"A\"\n";
        let err = parse_answer_key_str(bad_id, &path()).unwrap_err();
        assert!(err.to_string().contains("q1"));
    }

    #[test]
    fn validation_warnings() {
        let toml = r#"
[test]
id = "broken"
name = "Broken"

[[ranges]]
first = 1
last = 2
kind = "tfng"

[[ranges]]
first = 2
last = 3
kind = "choice"

[[ranges]]
first = 30
last = 33
kind = "heading"

[answers]
"1" = "MAYBE"
"2" = "FALSE"
"3" = ""
"7a" = "lonely"
"#;
        let key = parse_answer_key_str(toml, &path()).unwrap();
        let warnings = validate_answer_key(&key);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();

        assert!(messages.iter().any(|m| m.contains("'MAYBE' is not a valid tfng")));
        assert!(warnings
            .iter()
            .any(|w| w.question_id.as_deref() == Some("3") && w.message == "answer is empty"));
        assert!(messages.iter().any(|m| m.contains("single part (7a)")));
        assert!(messages.iter().any(|m| m.contains("30-33 (heading) covers no question")));
        assert!(messages.iter().any(|m| m.contains("overlap")));
    }

    #[test]
    fn empty_key_warns() {
        let toml = "[test]\nid = \"x\"\nname = \"X\"\n";
        let key = parse_answer_key_str(toml, &path()).unwrap();
        let warnings = validate_answer_key(&key);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].question_id, None);
    }

    #[test]
    fn check_file_reports_empty_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("key.toml");
        std::fs::write(
            &file,
            "[test]\nid = \"x\"\nname = \"X\"\n\n[answers]\n\"1\" = \"rain/\"\n\"2\" = \"sun/moon\"\n",
        )
        .unwrap();

        let (key, warnings) = check_answer_key_file(&file).unwrap();
        assert_eq!(key.total(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].question_id.as_deref(), Some("1"));
        assert!(warnings[0].message.contains("empty alternative"));
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), SAMPLE_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("listening");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("l1.toml"),
            "[test]\nid = \"l1\"\nname = \"L1\"\nmodule = \"listening\"\n\n[answers]\n\"1\" = \"A\"\n",
        )
        .unwrap();

        let keys = load_key_directory(dir.path()).unwrap();
        let ids: Vec<&str> = keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "sample-reading"]);

        assert_eq!(find_key(dir.path(), "l1").unwrap().module, TestModule::Listening);
        assert!(find_key(dir.path(), "missing").is_err());
        assert!(load_key_directory(&dir.path().join("good.toml")).is_err());
    }

    #[test]
    fn load_answers_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("answers.json");
        std::fs::write(&json, r#"{"1": "true", "2": null, "3": 4, "23a": "books"}"#).unwrap();
        let answers = load_answer_set(&json).unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("1"), Some("true"));
        assert_eq!(answers.get("2"), None);
        assert_eq!(answers.get("23a"), Some("books"));

        let toml = dir.path().join("answers.toml");
        std::fs::write(&toml, "1 = \"B\"\n23b = \"activities\"\n").unwrap();
        let answers = load_answer_set(&toml).unwrap();
        assert_eq!(answers.get("1"), Some("B"));
        assert_eq!(answers.get("23b"), Some("activities"));

        std::fs::write(&json, "[1, 2]").unwrap();
        assert!(load_answer_set(&json).is_err());
    }
}
