//! Collaborator configuration and factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bandcheck_core::matcher::MatchTolerance;
use bandcheck_core::model::TestModule;
use bandcheck_core::traits::{AudioClip, EvaluationRequest, Evaluator, ScoreStore, Transcriber};

use crate::mock::{MockEvaluator, MockTranscriber, SAMPLE_EVALUATION};
use crate::openai::OpenAiEvaluator;
use crate::store::{FileStore, NoopStore, RestStore};
use crate::transcription::WhisperTranscriber;

const MASK: &str = "***";

/// Which backend grades speaking transcripts.
///
/// Note: Custom Debug impls in this module mask API keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EvaluatorConfig {
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
        #[serde(default)]
        temperature: f64,
    },
    Mock {
        #[serde(default)]
        response: Option<String>,
    },
}

impl std::fmt::Debug for EvaluatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorConfig::OpenAI {
                api_key: _,
                base_url,
                model,
                org_id,
                temperature,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &MASK)
                .field("base_url", base_url)
                .field("model", model)
                .field("org_id", org_id)
                .field("temperature", temperature)
                .finish(),
            EvaluatorConfig::Mock { response } => {
                f.debug_struct("Mock").field("response", response).finish()
            }
        }
    }
}

/// Which backend turns recordings into text.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriberConfig {
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default = "default_language")]
        language: Option<String>,
    },
    Mock {
        #[serde(default)]
        transcript: Option<String>,
    },
}

fn default_language() -> Option<String> {
    Some("en".to_string())
}

impl std::fmt::Debug for TranscriberConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriberConfig::OpenAI {
                api_key: _,
                base_url,
                model,
                language,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &MASK)
                .field("base_url", base_url)
                .field("model", model)
                .field("language", language)
                .finish(),
            TranscriberConfig::Mock { transcript } => f
                .debug_struct("Mock")
                .field("transcript", transcript)
                .finish(),
        }
    }
}

/// Where finished attempts are persisted.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Rest {
        url: String,
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        table: Option<String>,
    },
    File {
        path: PathBuf,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Rest {
                url,
                api_key: _,
                table,
            } => f
                .debug_struct("Rest")
                .field("url", url)
                .field("api_key", &MASK)
                .field("table", table)
                .finish(),
            StoreConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
        }
    }
}

/// Top-level bandcheck configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandcheckConfig {
    #[serde(default)]
    pub evaluator: Option<EvaluatorConfig>,
    #[serde(default)]
    pub transcriber: Option<TranscriberConfig>,
    /// No store means scores are only shown, never saved.
    #[serde(default)]
    pub store: Option<StoreConfig>,
    /// Fuzzy-matching tolerance for free-text answers.
    #[serde(default)]
    pub matching: MatchTolerance,
    /// Module assumed when a command does not say.
    #[serde(default = "default_module")]
    pub default_module: TestModule,
    /// Directory searched for answer keys by id.
    #[serde(default = "default_keys_dir")]
    pub answer_keys_dir: PathBuf,
    /// Output directory for attempt reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_module() -> TestModule {
    TestModule::AcademicReading
}
fn default_keys_dir() -> PathBuf {
    PathBuf::from("./answer-keys")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./bandcheck-results")
}

impl Default for BandcheckConfig {
    fn default() -> Self {
        Self {
            evaluator: None,
            transcriber: None,
            store: None,
            matching: MatchTolerance::default(),
            default_module: default_module(),
            answer_keys_dir: default_keys_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_opt(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|v| resolve_env_vars(v))
}

impl BandcheckConfig {
    /// Resolve `${VAR}` references in every string a user may template.
    fn resolve_env(&mut self) {
        if let Some(EvaluatorConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            ..
        }) = &mut self.evaluator
        {
            *api_key = resolve_env_vars(api_key);
            *base_url = resolve_opt(base_url);
            *org_id = resolve_opt(org_id);
        }
        if let Some(TranscriberConfig::OpenAI {
            api_key, base_url, ..
        }) = &mut self.transcriber
        {
            *api_key = resolve_env_vars(api_key);
            *base_url = resolve_opt(base_url);
        }
        if let Some(StoreConfig::Rest { url, api_key, .. }) = &mut self.store {
            *url = resolve_env_vars(url);
            *api_key = resolve_env_vars(api_key);
        }
    }

    /// Apply `BANDCHECK_OPENAI_KEY` / `BANDCHECK_STORE_KEY`.
    fn apply_key_overrides(&mut self, openai_key: Option<String>, store_key: Option<String>) {
        if let Some(key) = openai_key {
            let evaluator = self.evaluator.get_or_insert_with(|| EvaluatorConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                model: None,
                org_id: None,
                temperature: 0.0,
            });
            if let EvaluatorConfig::OpenAI { api_key, .. } = evaluator {
                *api_key = key.clone();
            }

            let transcriber = self
                .transcriber
                .get_or_insert_with(|| TranscriberConfig::OpenAI {
                    api_key: String::new(),
                    base_url: None,
                    model: None,
                    language: default_language(),
                });
            if let TranscriberConfig::OpenAI { api_key, .. } = transcriber {
                *api_key = key;
            }
        }

        // A REST store needs a URL, so the key alone cannot create one
        if let (Some(key), Some(StoreConfig::Rest { api_key, .. })) = (store_key, &mut self.store)
        {
            *api_key = key;
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `bandcheck.toml` in the current directory
/// 2. `~/.config/bandcheck/config.toml`
///
/// Environment variable overrides: `BANDCHECK_OPENAI_KEY`, `BANDCHECK_STORE_KEY`.
pub fn load_config() -> Result<BandcheckConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BandcheckConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("bandcheck.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!("loading config from {}", path.display());
            toml::from_str::<BandcheckConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BandcheckConfig::default(),
    };

    config.apply_key_overrides(
        std::env::var("BANDCHECK_OPENAI_KEY").ok(),
        std::env::var("BANDCHECK_STORE_KEY").ok(),
    );
    config.resolve_env();

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("bandcheck"))
}

fn require_key(api_key: &str, what: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        anyhow::bail!("no API key for the {what}; set BANDCHECK_OPENAI_KEY or api_key in bandcheck.toml");
    }
    Ok(())
}

/// Create an evaluator. No configuration means every call fails.
pub fn create_evaluator(config: Option<&EvaluatorConfig>) -> Result<Arc<dyn Evaluator>> {
    match config {
        Some(EvaluatorConfig::OpenAI {
            api_key,
            base_url,
            model,
            org_id,
            temperature,
        }) => {
            require_key(api_key, "evaluator")?;
            let evaluator =
                OpenAiEvaluator::new(api_key, base_url.clone(), model.clone(), org_id.clone())?
                    .with_temperature(*temperature);
            Ok(Arc::new(evaluator))
        }
        Some(EvaluatorConfig::Mock { response }) => Ok(Arc::new(
            MockEvaluator::with_fixed_response(response.as_deref().unwrap_or(SAMPLE_EVALUATION)),
        )),
        None => Ok(Arc::new(Unconfigured("evaluator"))),
    }
}

/// Create a transcriber. No configuration means every call fails.
pub fn create_transcriber(config: Option<&TranscriberConfig>) -> Result<Arc<dyn Transcriber>> {
    match config {
        Some(TranscriberConfig::OpenAI {
            api_key,
            base_url,
            model,
            language,
        }) => {
            require_key(api_key, "transcriber")?;
            Ok(Arc::new(WhisperTranscriber::new(
                api_key,
                base_url.clone(),
                model.clone(),
                language.clone(),
            )?))
        }
        Some(TranscriberConfig::Mock { transcript }) => Ok(Arc::new(
            MockTranscriber::with_transcript(transcript.as_deref().unwrap_or_default()),
        )),
        None => Ok(Arc::new(Unconfigured("transcriber"))),
    }
}

/// Stand-in for a collaborator section missing from the config.
struct Unconfigured(&'static str);

impl Unconfigured {
    fn error(&self) -> anyhow::Error {
        anyhow::anyhow!(
            "no {0} configured; add a [{0}] section to bandcheck.toml",
            self.0
        )
    }
}

#[async_trait]
impl Transcriber for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
        Err(self.error())
    }
}

#[async_trait]
impl Evaluator for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn evaluate(&self, _request: &EvaluationRequest) -> Result<String> {
        Err(self.error())
    }
}

/// Create a score store. No configuration means a store that discards.
pub fn create_store(config: Option<&StoreConfig>) -> Result<Arc<dyn ScoreStore>> {
    match config {
        Some(StoreConfig::Rest {
            url,
            api_key,
            table,
        }) => Ok(Arc::new(RestStore::new(url, api_key, table.clone())?)),
        Some(StoreConfig::File { path }) => Ok(Arc::new(FileStore::new(path.clone()))),
        None => Ok(Arc::new(NoopStore)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_BANDCHECK_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_BANDCHECK_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_BANDCHECK_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unclosed"), "${unclosed");
        std::env::remove_var("_BANDCHECK_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_values() {
        std::env::set_var("_BANDCHECK_SELF", "${_BANDCHECK_SELF}");
        assert_eq!(resolve_env_vars("${_BANDCHECK_SELF}"), "${_BANDCHECK_SELF}");
        assert_eq!(
            resolve_env_vars("a${_BANDCHECK_SELF}b${_BANDCHECK_SELF}"),
            "a${_BANDCHECK_SELF}b${_BANDCHECK_SELF}"
        );
        std::env::remove_var("_BANDCHECK_SELF");
    }

    #[test]
    fn default_config() {
        let config = BandcheckConfig::default();
        assert!(config.evaluator.is_none());
        assert!(config.store.is_none());
        assert_eq!(config.default_module, TestModule::AcademicReading);
        assert_eq!(config.matching, MatchTolerance::default());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_module = "listening"

[matching]
max_edits = 0
word_order = false

[evaluator]
type = "openai"
api_key = "sk-test"
model = "gpt-4.1"

[transcriber]
type = "mock"
transcript = "hello"

[store]
type = "rest"
url = "https://example.supabase.co"
api_key = "anon"
"#;
        let config: BandcheckConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_module, TestModule::Listening);
        assert_eq!(config.matching.max_edits, 0);
        assert!(!config.matching.word_order);
        assert!(config.matching.allow_plurals);
        assert!(matches!(
            config.evaluator,
            Some(EvaluatorConfig::OpenAI { ref model, .. }) if model.as_deref() == Some("gpt-4.1")
        ));
        assert!(matches!(
            config.transcriber,
            Some(TranscriberConfig::Mock { .. })
        ));
        assert!(matches!(config.store, Some(StoreConfig::Rest { .. })));
    }

    #[test]
    fn debug_masks_keys() {
        let config = BandcheckConfig {
            evaluator: Some(EvaluatorConfig::OpenAI {
                api_key: "sk-secret".into(),
                base_url: None,
                model: None,
                org_id: None,
                temperature: 0.0,
            }),
            store: Some(StoreConfig::Rest {
                url: "https://db".into(),
                api_key: "store-secret".into(),
                table: None,
            }),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("store-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn key_overrides() {
        let mut config = BandcheckConfig {
            store: Some(StoreConfig::Rest {
                url: "https://db".into(),
                api_key: "old".into(),
                table: None,
            }),
            ..Default::default()
        };
        config.apply_key_overrides(Some("sk-env".into()), Some("store-env".into()));

        assert!(matches!(
            config.evaluator,
            Some(EvaluatorConfig::OpenAI { ref api_key, .. }) if api_key == "sk-env"
        ));
        assert!(matches!(
            config.transcriber,
            Some(TranscriberConfig::OpenAI { ref api_key, .. }) if api_key == "sk-env"
        ));
        assert!(matches!(
            config.store,
            Some(StoreConfig::Rest { ref api_key, .. }) if api_key == "store-env"
        ));

        // Mock backends are left alone
        let mut config = BandcheckConfig {
            evaluator: Some(EvaluatorConfig::Mock { response: None }),
            ..Default::default()
        };
        config.apply_key_overrides(Some("sk-env".into()), Some("ignored".into()));
        assert!(matches!(config.evaluator, Some(EvaluatorConfig::Mock { .. })));
        assert!(config.store.is_none());
    }

    #[test]
    fn load_from_explicit_path() {
        std::env::set_var("_BANDCHECK_STORE_URL", "https://from-env");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bandcheck.toml");
        std::fs::write(
            &path,
            "[store]\ntype = \"rest\"\nurl = \"${_BANDCHECK_STORE_URL}\"\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert!(matches!(
            config.store,
            Some(StoreConfig::Rest { ref url, .. }) if url == "https://from-env"
        ));
        std::env::remove_var("_BANDCHECK_STORE_URL");

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn factories() {
        let missing_key = EvaluatorConfig::OpenAI {
            api_key: String::new(),
            base_url: None,
            model: None,
            org_id: None,
            temperature: 0.0,
        };
        let err = create_evaluator(Some(&missing_key)).err().unwrap();
        assert!(err.to_string().contains("no API key"));

        let mock = create_evaluator(Some(&EvaluatorConfig::Mock { response: None })).unwrap();
        assert_eq!(mock.name(), "mock");

        let transcriber =
            create_transcriber(Some(&TranscriberConfig::Mock { transcript: None })).unwrap();
        assert_eq!(transcriber.name(), "mock");

        assert_eq!(create_store(None).unwrap().name(), "none");
        let file = StoreConfig::File {
            path: PathBuf::from("scores.jsonl"),
        };
        assert_eq!(create_store(Some(&file)).unwrap().name(), "file");
    }

    #[tokio::test]
    async fn missing_sections_fail_per_call() {
        let evaluator = create_evaluator(None).unwrap();
        let err = evaluator
            .evaluate(&EvaluationRequest::new("t", "x", 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no evaluator configured"));

        let transcriber = create_transcriber(None).unwrap();
        let err = transcriber
            .transcribe(&AudioClip::new(vec![1], "a.wav"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("[transcriber]"));
    }
}
