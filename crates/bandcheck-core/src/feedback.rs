//! Parsing of speaking-evaluation responses.
//!
//! Evaluators are asked for JSON but often wrap it in prose or a markdown
//! fence. Extraction strategies run in order until one yields a structured
//! record; otherwise the raw text is kept.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::band::Band;

const OVERALL_FIELDS: &[&str] = &[
    "overall_band",
    "band_score",
    "bandScore",
    "overall",
    "band",
    "score",
];
const FEEDBACK_FIELDS: &[&str] = &["feedback", "comments", "summary"];
const STRENGTH_FIELDS: &[&str] = &["strengths"];
const IMPROVEMENT_FIELDS: &[&str] = &["improvements", "suggestions"];

/// Per-criterion bands of the IELTS speaking rubric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionBands {
    pub fluency_coherence: Option<Band>,
    pub lexical_resource: Option<Band>,
    pub grammatical_range: Option<Band>,
    pub pronunciation: Option<Band>,
}

impl CriterionBands {
    fn is_empty(&self) -> bool {
        self.fluency_coherence.is_none()
            && self.lexical_resource.is_none()
            && self.grammatical_range.is_none()
            && self.pronunciation.is_none()
    }

    /// Mean of the criteria present, snapped to a half band.
    pub fn mean(&self) -> Option<Band> {
        let present: Vec<f64> = [
            self.fluency_coherence,
            self.lexical_resource,
            self.grammatical_range,
            self.pronunciation,
        ]
        .into_iter()
        .flatten()
        .map(Band::as_f64)
        .collect();
        if present.is_empty() {
            return None;
        }
        Band::from_f64(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Structured result extracted from an evaluator response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakingEvaluation {
    pub overall: Option<Band>,
    #[serde(default)]
    pub criteria: CriterionBands,
    pub feedback: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl SpeakingEvaluation {
    /// The overall band, or the criteria mean when the evaluator gave none.
    pub fn effective_band(&self) -> Option<Band> {
        self.overall.or_else(|| self.criteria.mean())
    }
}

/// What the pipeline could make of the evaluation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EvaluationOutcome {
    /// A record was extracted.
    Structured(SpeakingEvaluation),
    /// The evaluator answered, but with nothing we could parse.
    Raw(String),
    /// The evaluator could not be reached; carries the error message.
    Unavailable(String),
}

impl EvaluationOutcome {
    pub fn band(&self) -> Option<Band> {
        match self {
            EvaluationOutcome::Structured(e) => e.effective_band(),
            _ => None,
        }
    }
}

type Strategy = fn(&str) -> Option<SpeakingEvaluation>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("strict", strict_json),
    ("fenced", fenced_json),
    ("embedded", embedded_object),
];

/// Parse an evaluator response, falling back to the raw text.
pub fn parse_evaluation(response: &str) -> EvaluationOutcome {
    for (name, strategy) in STRATEGIES {
        if let Some(evaluation) = strategy(response) {
            tracing::debug!("evaluation parsed with '{name}' strategy");
            return EvaluationOutcome::Structured(evaluation);
        }
    }
    tracing::debug!("evaluation response kept as raw text");
    EvaluationOutcome::Raw(response.trim().to_string())
}

/// The whole response is a JSON object.
fn strict_json(response: &str) -> Option<SpeakingEvaluation> {
    let value: Value = serde_json::from_str(response.trim()).ok()?;
    from_value(&value)
}

/// A markdown code fence holds the JSON. `json`-tagged fences win.
fn fenced_json(response: &str) -> Option<SpeakingEvaluation> {
    let mut tagged = Vec::new();
    let mut generic = Vec::new();
    let mut in_block = false;
    let mut is_json = false;
    let mut current = String::new();

    for line in response.lines() {
        let trimmed = line.trim();
        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json = lang == "json";
            current.clear();
            continue;
        }
        if in_block && trimmed == "```" {
            in_block = false;
            if is_json {
                tagged.push(std::mem::take(&mut current));
            } else {
                generic.push(std::mem::take(&mut current));
            }
            continue;
        }
        if in_block {
            current.push_str(line);
            current.push('\n');
        }
    }

    // Truncated response with an unclosed fence
    if in_block && !current.is_empty() {
        if is_json {
            tagged.push(current);
        } else {
            generic.push(current);
        }
    }

    tagged.iter().chain(generic.iter()).find_map(|block| strict_json(block))
}

/// A balanced `{ ... }` span somewhere in surrounding prose.
fn embedded_object(response: &str) -> Option<SpeakingEvaluation> {
    response
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| {
            let end = balanced_end(&response[start..])?;
            strict_json(&response[start..start + end])
        })
}

/// Byte length of the balanced object at the start of `s`, honoring strings.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Map a JSON object onto the known fields. `None` when nothing is recognised.
fn from_value(value: &Value) -> Option<SpeakingEvaluation> {
    let obj = value.as_object()?;

    let criteria = CriterionBands {
        fluency_coherence: criterion(obj, &["fluency_coherence", "fluencyCoherence"]),
        lexical_resource: criterion(obj, &["lexical_resource", "lexicalResource"]),
        grammatical_range: criterion(obj, &["grammatical_range", "grammaticalRange"]),
        pronunciation: criterion(obj, &["pronunciation"]),
    };

    let evaluation = SpeakingEvaluation {
        overall: criterion(obj, OVERALL_FIELDS),
        criteria,
        feedback: FEEDBACK_FIELDS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        strengths: string_list(obj, STRENGTH_FIELDS),
        improvements: string_list(obj, IMPROVEMENT_FIELDS),
    };

    let recognised = evaluation.overall.is_some()
        || !evaluation.criteria.is_empty()
        || evaluation.feedback.is_some()
        || !evaluation.strengths.is_empty()
        || !evaluation.improvements.is_empty();
    recognised.then_some(evaluation)
}

fn criterion(obj: &Map<String, Value>, names: &[&str]) -> Option<Band> {
    names.iter().find_map(|k| obj.get(*k).and_then(band_value))
}

/// Numbers or numeric strings ("6.5", "6.5/9", "Band 7"), snapped to a half band.
fn band_value(value: &Value) -> Option<Band> {
    match value {
        Value::Number(n) => n.as_f64().and_then(Band::from_f64),
        Value::String(s) => {
            let head = s.split('/').next().unwrap_or_default();
            let digits: String = head
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().ok().and_then(Band::from_f64)
        }
        _ => None,
    }
}

fn string_list(obj: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    let Some(value) = names.iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(v: f64) -> Band {
        Band::from_f64(v).unwrap()
    }

    fn structured(outcome: EvaluationOutcome) -> SpeakingEvaluation {
        match outcome {
            EvaluationOutcome::Structured(e) => e,
            other => panic!("expected structured evaluation, got {other:?}"),
        }
    }

    #[test]
    fn strict_json_response() {
        let response = r#"{
            "overall_band": 6.5,
            "fluency_coherence": 6,
            "lexical_resource": 7,
            "grammatical_range": 6.5,
            "pronunciation": 6.5,
            "feedback": "Clear answer with some hesitation.",
            "strengths": ["good range of vocabulary"],
            "improvements": ["use more complex sentences", "reduce pauses"]
        }"#;
        let e = structured(parse_evaluation(response));
        assert_eq!(e.overall, Some(band(6.5)));
        assert_eq!(e.criteria.lexical_resource, Some(band(7.0)));
        assert_eq!(e.feedback.as_deref(), Some("Clear answer with some hesitation."));
        assert_eq!(e.strengths.len(), 1);
        assert_eq!(e.improvements.len(), 2);
    }

    #[test]
    fn fenced_json_response() {
        let response = "Here is my assessment:\n\n```json\n{\"bandScore\": \"7\", \"comments\": \"Fluent.\"}\n```\n\nGood luck!";
        let e = structured(parse_evaluation(response));
        assert_eq!(e.overall, Some(band(7.0)));
        assert_eq!(e.feedback.as_deref(), Some("Fluent."));
    }

    #[test]
    fn generic_fence_and_unclosed_fence() {
        let generic = "```\n{\"band\": 5.5}\n```";
        assert_eq!(structured(parse_evaluation(generic)).overall, Some(band(5.5)));

        let truncated = "```json\n{\"score\": 6, \"feedback\": \"ok\"}\n";
        assert_eq!(structured(parse_evaluation(truncated)).overall, Some(band(6.0)));
    }

    #[test]
    fn embedded_object_in_prose() {
        let response = r#"Assessment {draft} follows: {"overall": "6.5/9", "feedback": "Uses {braces} in text"} end."#;
        let e = structured(parse_evaluation(response));
        assert_eq!(e.overall, Some(band(6.5)));
        assert_eq!(e.feedback.as_deref(), Some("Uses {braces} in text"));
    }

    #[test]
    fn camel_case_criteria() {
        let response =
            r#"{"fluencyCoherence": 7, "lexicalResource": "6", "pronunciation": "Band 6"}"#;
        let e = structured(parse_evaluation(response));
        assert_eq!(e.overall, None);
        assert_eq!(e.criteria.fluency_coherence, Some(band(7.0)));
        assert_eq!(e.criteria.lexical_resource, Some(band(6.0)));
        assert_eq!(e.criteria.grammatical_range, None);
        assert_eq!(e.effective_band(), Some(band(6.5)));
    }

    #[test]
    fn unlisted_fields_are_ignored() {
        for response in [
            r#"{"overallBand": 7}"#,
            r#"{"areas_for_improvement": ["pace"]}"#,
            r#"{"fluency": 7, "vocabulary": 6, "grammar": 6}"#,
            r#"{"criteria": {"fluency_coherence": 7}}"#,
            r#"{"scores": {"pronunciation": 6}}"#,
            r#"{"overall_band": {"band": 7}}"#,
        ] {
            assert!(
                matches!(parse_evaluation(response), EvaluationOutcome::Raw(_)),
                "{response} should not be structured"
            );
        }

        let e = structured(parse_evaluation(r#"{"band": 6, "overallBand": 8, "grammar": 9}"#));
        assert_eq!(e.overall, Some(band(6.0)));
        assert!(e.criteria.grammatical_range.is_none());
    }

    #[test]
    fn raw_fallback() {
        let response = "  You spoke well, roughly a band six.  ";
        assert_eq!(
            parse_evaluation(response),
            EvaluationOutcome::Raw("You spoke well, roughly a band six.".into())
        );
        // JSON with nothing we know about is not a structured evaluation
        assert!(matches!(
            parse_evaluation(r#"{"unrelated": true}"#),
            EvaluationOutcome::Raw(_)
        ));
    }

    #[test]
    fn out_of_range_bands_are_dropped() {
        let e = structured(parse_evaluation(r#"{"overall_band": 12, "feedback": "x"}"#));
        assert_eq!(e.overall, None);
        assert_eq!(EvaluationOutcome::Structured(e).band(), None);
    }

    #[test]
    fn balanced_end_ignores_braces_in_strings() {
        assert_eq!(balanced_end(r#"{"a": "}"} tail"#), Some(10));
        assert_eq!(balanced_end("{ unclosed"), None);
    }
}
