//! # village-llm: text generation for the village
//!
//! Everything an NPC says, does, or remembers in summary comes from a
//! [`Generator`]. This crate defines that seam and its backends:
//!   - **Command**: a local model run once per prompt (`ollama run phi3 <prompt>`)
//!   - **Ollama**: the Ollama HTTP API
//!   - **None**: always fails, so callers fall back to canned lines
//!   - **Scripted**: deterministic replies for tests and offline runs
//!
//! Calls are blocking and carry a hard timeout. Failures are always
//! reported as [`GenerationError`], never as an empty string; callers decide
//! whether to fall back (conversation) or propagate (memory summaries).

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod types;

pub use client::{build_generator, CommandGenerator, OllamaGenerator, UnavailableGenerator};
pub use error::GenerationError;
pub use generator::{Generator, ScriptedGenerator};
pub use prompt::PromptId;
pub use types::{BackendConfig, BackendKind};
