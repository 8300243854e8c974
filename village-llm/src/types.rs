//! Backend configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which backend produces text for the village.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A local command-line model, invoked once per prompt (e.g. `ollama run phi3 <prompt>`).
    Command,
    /// The Ollama HTTP API (`POST {base_url}/api/generate`).
    Ollama,
    /// No backend. Every call fails, so NPCs only ever use fallback lines.
    None,
}

/// Generation backend settings, the `[llm]` section of `village.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend selector.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Executable for the command backend.
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the prompt for the command backend.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Base URL for the Ollama backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name for the Ollama backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for any single generation call in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl BackendConfig {
    /// The per-call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            program: default_program(),
            args: default_args(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_backend() -> BackendKind { BackendKind::Command }
fn default_program() -> String { "ollama".to_string() }
fn default_args() -> Vec<String> { vec!["run".to_string(), "phi3".to_string()] }
fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "phi3".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
