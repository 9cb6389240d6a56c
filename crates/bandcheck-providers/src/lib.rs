//! bandcheck-providers: Collaborator integrations.
//!
//! Implements the `Transcriber`, `Evaluator`, and `ScoreStore` traits over
//! OpenAI-compatible HTTP APIs and a REST table endpoint, plus file and mock
//! backends for offline use and tests.

pub mod config;
mod http;
pub mod mock;
pub mod openai;
pub mod store;
pub mod transcription;

pub use config::{
    create_evaluator, create_store, create_transcriber, load_config, load_config_from,
    BandcheckConfig, EvaluatorConfig, StoreConfig, TranscriberConfig,
};
