//! Answer matching with typo, plural, and word-order tolerance.
//!
//! Categorical answers (letters, TRUE/FALSE/NOT GIVEN, headings) are compared
//! exactly after normalization. Free-text blanks go through the tolerance
//! rules in [`MatchTolerance`].

use serde::{Deserialize, Serialize};

use crate::model::{AnswerKind, AnswerSet, CanonicalAnswer, Question};

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"', '\''];
const ARTICLES: &[&str] = &["a", "an", "the"];

/// Normalize an answer for comparison.
///
/// Lowercases, trims, collapses internal whitespace, and strips trailing
/// punctuation.
pub fn normalize(input: &str) -> String {
    let collapsed = input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(|c: char| TRAILING_PUNCTUATION.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Tolerance applied to free-text (`Word`) answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTolerance {
    /// Accept multi-word answers in any order.
    pub word_order: bool,
    /// Ignore a leading "a", "an", or "the".
    pub ignore_articles: bool,
    /// Accept singular/plural variants of each word.
    pub allow_plurals: bool,
    /// Answers shorter than this many characters must be spelled exactly.
    pub short_len: usize,
    /// Answers shorter than this allow one edit; longer ones allow `max_edits`.
    pub long_len: usize,
    /// Edit budget for long answers. Edits never touch the first or last letter.
    pub max_edits: usize,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            word_order: true,
            ignore_articles: true,
            allow_plurals: true,
            short_len: 5,
            long_len: 8,
            max_edits: 1,
        }
    }
}

impl MatchTolerance {
    /// No tolerance at all: only normalized equality with an alternative.
    pub fn strict() -> Self {
        Self {
            word_order: false,
            ignore_articles: false,
            allow_plurals: false,
            short_len: usize::MAX,
            long_len: usize::MAX,
            max_edits: 0,
        }
    }

    /// Edits allowed for an expected answer of `char_count` characters.
    pub fn max_edits_for(&self, char_count: usize) -> usize {
        if char_count < self.short_len {
            0
        } else if char_count < self.long_len {
            self.max_edits.min(1)
        } else {
            self.max_edits
        }
    }
}

/// Decides whether a learner's answer matches a canonical answer.
///
/// Stateless apart from its tolerance; safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    tolerance: MatchTolerance,
}

impl Matcher {
    pub fn new(tolerance: MatchTolerance) -> Self {
        Self { tolerance }
    }

    pub fn strict() -> Self {
        Self::new(MatchTolerance::strict())
    }

    pub fn tolerance(&self) -> &MatchTolerance {
        &self.tolerance
    }

    /// Match a single answer against a non-composite canonical answer.
    ///
    /// Missing, empty, or whitespace-only answers never match. A composite
    /// answer cannot be checked from one string and never matches here; use
    /// [`Matcher::match_question`].
    pub fn is_match(
        &self,
        user_answer: Option<&str>,
        canonical: &CanonicalAnswer,
        kind: AnswerKind,
    ) -> bool {
        let Some(user_answer) = user_answer else {
            return false;
        };
        let user = normalize(user_answer);
        if user.is_empty() {
            return false;
        }

        let accepted: Vec<String> = canonical
            .accepted()
            .iter()
            .map(|a| normalize(a))
            .filter(|a| !a.is_empty())
            .collect();

        if accepted.iter().any(|a| *a == user) {
            return true;
        }
        if kind.is_categorical() {
            return false;
        }
        accepted.iter().any(|a| self.is_close(&user, a))
    }

    /// Score one question of a key against an answer set.
    ///
    /// Composite questions require every part to be answered and matched.
    pub fn match_question(&self, question: &Question, answers: &AnswerSet) -> bool {
        match &question.answer {
            CanonicalAnswer::Composite(parts) => {
                !parts.is_empty()
                    && parts
                        .iter()
                        .all(|p| self.is_match(answers.get(&p.id), &p.answer, question.kind))
            }
            answer => self.is_match(answers.get(&question.id), answer, question.kind),
        }
    }

    /// Fuzzy comparison of two normalized free-text answers.
    fn is_close(&self, user: &str, expected: &str) -> bool {
        let t = &self.tolerance;
        let user_tokens = self.content_tokens(user);
        let expected_tokens = self.content_tokens(expected);
        if user_tokens.is_empty() || expected_tokens.is_empty() {
            return false;
        }

        if user_tokens.len() == expected_tokens.len() {
            let in_order = user_tokens
                .iter()
                .zip(&expected_tokens)
                .all(|(u, e)| self.same_word(u, e));
            if in_order {
                return true;
            }
            if t.word_order
                && expected_tokens.len() > 1
                && self.same_words_any_order(&user_tokens, &expected_tokens)
            {
                return true;
            }
        }

        let user_joined = user_tokens.join(" ");
        let expected_joined = expected_tokens.join(" ");
        if has_digit(&user_joined) || has_digit(&expected_joined) {
            return false;
        }
        // First and last letters are fixed (impossible/possible, cheat/cheap)
        if user_joined.chars().next() != expected_joined.chars().next()
            || user_joined.chars().last() != expected_joined.chars().last()
        {
            return false;
        }
        let limit = t.max_edits_for(expected_joined.chars().count());
        limit > 0 && strsim::levenshtein(&user_joined, &expected_joined) <= limit
    }

    fn content_tokens<'a>(&self, answer: &'a str) -> Vec<&'a str> {
        let mut tokens: Vec<&str> = answer.split(' ').filter(|t| !t.is_empty()).collect();
        if self.tolerance.ignore_articles && tokens.len() > 1 && ARTICLES.contains(&tokens[0]) {
            tokens.remove(0);
        }
        tokens
    }

    fn same_word(&self, a: &str, b: &str) -> bool {
        a == b || (self.tolerance.allow_plurals && (is_plural_of(a, b) || is_plural_of(b, a)))
    }

    fn same_words_any_order(&self, user: &[&str], expected: &[&str]) -> bool {
        let mut used = vec![false; expected.len()];
        user.iter().all(|u| {
            let found = expected
                .iter()
                .enumerate()
                .find(|(i, e)| !used[*i] && self.same_word(u, e))
                .map(|(i, _)| i);
            match found {
                Some(i) => {
                    used[i] = true;
                    true
                }
                None => false,
            }
        })
    }
}

/// Match raw strings, treating `canonical_answer` as a slash-separated list.
pub fn is_match(user_answer: &str, canonical_answer: &str, kind: AnswerKind) -> bool {
    Matcher::default().is_match(
        Some(user_answer),
        &CanonicalAnswer::parse(canonical_answer),
        kind,
    )
}

/// `-ies`/`-es` need a stem of 3+ letters; a bare `-s` needs 4+ so new/news stay apart.
fn is_plural_of(plural: &str, singular: &str) -> bool {
    let len = singular.chars().count();
    if len < 3 {
        return false;
    }
    if let Some(stem) = plural.strip_suffix("ies") {
        if singular.strip_suffix('y') == Some(stem) {
            return true;
        }
    }
    plural.strip_suffix("es") == Some(singular)
        || (len >= 4 && plural.strip_suffix('s') == Some(singular))
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}
