//! Core data model types for bandcheck.
//!
//! These are the types the rest of the system uses to represent answer keys,
//! canonical answers, and a learner's answer set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matcher::{normalize, Matcher};

/// How strictly a question's answer is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerKind {
    /// Free-text blank (sentence/note/table completion). Fuzzy matching applies.
    Word,
    /// TRUE / FALSE / NOT GIVEN.
    TrueFalseNotGiven,
    /// YES / NO / NOT GIVEN.
    YesNoNotGiven,
    /// Multiple-choice or matching letter (A–L).
    Choice,
    /// Heading matching with Roman numerals (i–x).
    Heading,
}

const ROMAN_NUMERALS: &[&str] = &["i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x"];

impl AnswerKind {
    /// Categorical kinds never get fuzzy tolerance.
    pub fn is_categorical(self) -> bool {
        !matches!(self, AnswerKind::Word)
    }

    /// Guess the kind from the shape of a canonical answer.
    pub fn infer(canonical: &str) -> Self {
        let first = canonical.split('/').next().unwrap_or_default();
        let norm = normalize(first);
        match norm.as_str() {
            "true" | "false" | "not given" => AnswerKind::TrueFalseNotGiven,
            "yes" | "no" => AnswerKind::YesNoNotGiven,
            s if s.len() == 1 && matches!(s.as_bytes()[0], b'a'..=b'l') => AnswerKind::Choice,
            s if ROMAN_NUMERALS.contains(&s) => AnswerKind::Heading,
            _ => AnswerKind::Word,
        }
    }

    /// Whether `answer` is a legal value for this kind (after normalization).
    pub fn accepts_value(self, answer: &str) -> bool {
        let norm = normalize(answer);
        match self {
            AnswerKind::Word => !norm.is_empty(),
            AnswerKind::TrueFalseNotGiven => matches!(norm.as_str(), "true" | "false" | "not given"),
            AnswerKind::YesNoNotGiven => matches!(norm.as_str(), "yes" | "no" | "not given"),
            AnswerKind::Choice => norm.len() == 1 && matches!(norm.as_bytes()[0], b'a'..=b'l'),
            AnswerKind::Heading => ROMAN_NUMERALS.contains(&norm.as_str()),
        }
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerKind::Word => write!(f, "word"),
            AnswerKind::TrueFalseNotGiven => write!(f, "tfng"),
            AnswerKind::YesNoNotGiven => write!(f, "ynng"),
            AnswerKind::Choice => write!(f, "choice"),
            AnswerKind::Heading => write!(f, "heading"),
        }
    }
}

impl FromStr for AnswerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "word" | "blank" | "completion" => Ok(AnswerKind::Word),
            "tfng" | "true-false-not-given" => Ok(AnswerKind::TrueFalseNotGiven),
            "ynng" | "yes-no-not-given" => Ok(AnswerKind::YesNoNotGiven),
            "choice" | "mcq" | "letter" | "matching" => Ok(AnswerKind::Choice),
            "heading" | "headings" => Ok(AnswerKind::Heading),
            other => Err(format!("unknown answer kind: {other}")),
        }
    }
}

/// An accepted answer, resolved once when the key is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CanonicalAnswer {
    /// A single accepted string.
    Exact(String),
    /// Any of several accepted spellings or synonyms.
    Alternatives(Vec<String>),
    /// Several blanks scored as one question; every part must match.
    Composite(Vec<CompositePart>),
}

/// One blank of a composite question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositePart {
    /// Sub-id as it appears in answer sets (e.g. "23a").
    pub id: String,
    /// The part's own accepted answer. Never `Composite`.
    pub answer: CanonicalAnswer,
}

impl CanonicalAnswer {
    /// Parse a raw key entry. A slash always separates alternatives.
    pub fn parse(raw: &str) -> Self {
        let alternatives: Vec<String> = raw
            .split('/')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        match alternatives.len() {
            0 => CanonicalAnswer::Exact(String::new()),
            1 => CanonicalAnswer::Exact(alternatives.into_iter().next().unwrap_or_default()),
            _ => CanonicalAnswer::Alternatives(alternatives),
        }
    }

    /// Accepted strings of a non-composite answer.
    pub fn accepted(&self) -> &[String] {
        match self {
            CanonicalAnswer::Exact(s) => std::slice::from_ref(s),
            CanonicalAnswer::Alternatives(alts) => alts,
            CanonicalAnswer::Composite(_) => &[],
        }
    }
}

impl fmt::Display for CanonicalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalAnswer::Exact(s) => write!(f, "{s}"),
            CanonicalAnswer::Alternatives(alts) => write!(f, "{}", alts.join(" / ")),
            CanonicalAnswer::Composite(parts) => {
                let rendered: Vec<String> = parts
                    .iter()
                    .map(|p| format!("{}: {}", p.id, p.answer))
                    .collect();
                write!(f, "{}", rendered.join("; "))
            }
        }
    }
}

/// A single scored question of a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question number as shown on the page (e.g. "14" or "23").
    pub id: String,
    /// Comparison strictness.
    pub kind: AnswerKind,
    /// The accepted answer.
    pub answer: CanonicalAnswer,
}

/// Which IELTS paper a key belongs to. Selects the default band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestModule {
    Listening,
    AcademicReading,
    GeneralReading,
}

impl fmt::Display for TestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestModule::Listening => write!(f, "listening"),
            TestModule::AcademicReading => write!(f, "academic-reading"),
            TestModule::GeneralReading => write!(f, "general-reading"),
        }
    }
}

impl FromStr for TestModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "listening" => Ok(TestModule::Listening),
            "reading" | "academic-reading" | "academic" => Ok(TestModule::AcademicReading),
            "general-reading" | "general" | "general-training" => Ok(TestModule::GeneralReading),
            other => Err(format!("unknown test module: {other}")),
        }
    }
}

/// Assigns a kind to an inclusive range of question numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindRange {
    pub first: u32,
    pub last: u32,
    pub kind: AnswerKind,
}

impl KindRange {
    pub fn contains(&self, number: u32) -> bool {
        (self.first..=self.last).contains(&number)
    }
}

/// The canonical answers of one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Unique identifier (e.g. "book10-test2-reading").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub module: TestModule,
    /// Questions in page order, composite blanks already merged.
    pub questions: Vec<Question>,
    /// Kind ranges the questions were resolved with.
    #[serde(default)]
    pub ranges: Vec<KindRange>,
}

impl AnswerKey {
    /// Build a key from raw `(id, answer)` entries.
    ///
    /// Entries whose id is a number followed by a single letter (`23a`, `23b`)
    /// are merged into one composite question `23`. Kinds come from `ranges`
    /// when the question number is covered, otherwise they are inferred.
    pub fn from_entries<I>(
        id: impl Into<String>,
        name: impl Into<String>,
        module: TestModule,
        entries: I,
        ranges: Vec<KindRange>,
    ) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut grouped: BTreeMap<(u32, String), Vec<(String, String)>> = BTreeMap::new();
        for (entry_id, raw) in entries {
            let entry_id = entry_id.trim().to_string();
            let parent = composite_parent(&entry_id)
                .map(str::to_string)
                .unwrap_or_else(|| entry_id.clone());
            grouped
                .entry((question_number(&parent).unwrap_or(u32::MAX), parent))
                .or_default()
                .push((entry_id, raw));
        }

        let questions = grouped
            .into_iter()
            .map(|((number, parent), mut parts)| {
                let ranged = ranges.iter().find(|r| r.contains(number)).map(|r| r.kind);
                let is_composite = parts.len() > 1 || parts[0].0 != parent;

                if is_composite {
                    parts.sort_by(|a, b| a.0.cmp(&b.0));
                    let kind = ranged.unwrap_or_else(|| AnswerKind::infer(&parts[0].1));
                    let parts = parts
                        .into_iter()
                        .map(|(id, raw)| CompositePart {
                            id,
                            answer: CanonicalAnswer::parse(&raw),
                        })
                        .collect();
                    Question {
                        id: parent,
                        kind,
                        answer: CanonicalAnswer::Composite(parts),
                    }
                } else {
                    let (_, raw) = parts.remove(0);
                    Question {
                        id: parent,
                        kind: ranged.unwrap_or_else(|| AnswerKind::infer(&raw)),
                        answer: CanonicalAnswer::parse(&raw),
                    }
                }
            })
            .collect();

        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            module,
            questions,
            ranges,
        }
    }

    /// Number of scored questions.
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Look up a question by its id or by one of its composite sub-ids.
    pub fn question(&self, id: &str) -> Option<&Question> {
        let parent = composite_parent(id).unwrap_or(id);
        self.questions.iter().find(|q| q.id == id || q.id == parent)
    }

    /// Whether an answer-set key refers to something in this key.
    pub fn is_known_id(&self, id: &str) -> bool {
        self.questions.iter().any(|q| match &q.answer {
            CanonicalAnswer::Composite(parts) => parts.iter().any(|p| p.id == id),
            _ => q.id == id,
        })
    }

    /// Match one answer against the question `question_id` with default tolerance.
    ///
    /// A composite sub-id (`"23a"`) is checked against that part only.
    /// Unknown ids never match.
    pub fn is_match(&self, user_answer: Option<&str>, question_id: &str) -> bool {
        let matcher = Matcher::default();
        let Some(question) = self.question(question_id) else {
            return false;
        };
        match &question.answer {
            CanonicalAnswer::Composite(parts) => parts
                .iter()
                .find(|p| p.id == question_id)
                .is_some_and(|p| matcher.is_match(user_answer, &p.answer, question.kind)),
            answer => matcher.is_match(user_answer, answer, question.kind),
        }
    }
}

/// `"23a"` → `Some("23")`. Plain numbers and other ids return `None`.
pub fn composite_parent(id: &str) -> Option<&str> {
    let last = id.chars().last()?;
    let head = &id[..id.len() - last.len_utf8()];
    if last.is_ascii_lowercase() && !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) {
        Some(head)
    } else {
        None
    }
}

/// Leading question number of an id (`"23a"` → 23).
pub fn question_number(id: &str) -> Option<u32> {
    let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// A learner's answers, keyed by question id or composite sub-id.
///
/// Non-string values (null, numbers, booleans) in serialized input are
/// dropped on load and therefore count as "no answer".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, serde_json::Value>",
    into = "BTreeMap<String, String>"
)]
pub struct AnswerSet {
    entries: BTreeMap<String, String>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite the answer for `id`.
    pub fn set(&mut self, id: impl Into<String>, answer: impl Into<String>) {
        self.entries.insert(id.into(), answer.into());
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    /// Discard every answer (session restart).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of the raw answers, as handed to persistence.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for AnswerSet {
    fn from(raw: BTreeMap<String, serde_json::Value>) -> Self {
        let entries = raw
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        Self { entries }
    }
}

impl From<AnswerSet> for BTreeMap<String, String> {
    fn from(set: AnswerSet) -> Self {
        set.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
