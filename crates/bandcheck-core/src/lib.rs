//! bandcheck-core: Answer matching, scoring, and band lookup.
//!
//! This crate defines the answer-key model, the fuzzy answer matcher, score
//! aggregation and band conversion, plus the collaborator traits and the
//! practice pipeline that the rest of bandcheck builds on.

pub mod band;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod traits;
