//! Generation backends: a local command-line model and the Ollama HTTP API.
//!
//! Both backends expose the blocking [`Generator`] interface. Each owns a
//! small current-thread tokio runtime and drives one request to completion
//! per call, so they must not be called from inside another async runtime.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::json;
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::generator::Generator;
use crate::types::{BackendConfig, BackendKind};

fn runtime() -> Result<Runtime, GenerationError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| GenerationError::Config(format!("failed to start runtime: {e}")))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Build the backend selected by `config`.
///
/// # Errors
///
/// Returns [`GenerationError::Config`] if the configuration is unusable.
pub fn build_generator(config: &BackendConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    match config.backend {
        BackendKind::Command => Ok(Arc::new(CommandGenerator::new(
            config.program.clone(),
            config.args.clone(),
        )?)),
        BackendKind::Ollama => Ok(Arc::new(OllamaGenerator::new(
            config.base_url.clone(),
            config.model.clone(),
        )?)),
        BackendKind::None => Ok(Arc::new(UnavailableGenerator)),
    }
}

// ---------------------------------------------------------------------------
// Command-line backend
// ---------------------------------------------------------------------------

/// Runs `<program> <args..> <prompt>` and returns its trimmed standard output.
///
/// A non-zero exit is reported as [`GenerationError::NonZeroExit`]; a process
/// still running at the deadline is killed and reported as
/// [`GenerationError::Timeout`].
#[derive(Debug)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    runtime: Runtime,
}

impl CommandGenerator {
    /// Create a command backend.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] if `program` is empty or the
    /// internal runtime cannot be started.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self, GenerationError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(GenerationError::Config("command backend needs a program".into()));
        }
        Ok(Self {
            program,
            args,
            runtime: runtime()?,
        })
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GenerationError> {
        let start = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, command.output()).await });

        let output = match outcome {
            Err(_) => {
                warn!(program = %self.program, timeout_ms = millis(timeout), "Generation process timed out");
                return Err(GenerationError::Timeout(millis(timeout)));
            }
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "Failed to start generation process");
                return Err(GenerationError::Spawn(e.to_string()));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(program = %self.program, code = ?output.status.code(), %stderr, "Generation process failed");
            return Err(GenerationError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            program = %self.program,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Generation completed"
        );
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Ollama HTTP backend
// ---------------------------------------------------------------------------

/// Calls Ollama's `/api/generate` endpoint with streaming disabled.
#[derive(Debug)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    http: Client,
    runtime: Runtime,
}

impl OllamaGenerator {
    /// Create an Ollama backend.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] if the internal runtime cannot be started.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http: Client::new(),
            runtime: runtime()?,
        })
    }

    async fn request(&self, prompt: &str, timeout: Duration) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| match GenerationError::from(e) {
                GenerationError::Timeout(_) => GenerationError::Timeout(millis(timeout)),
                other => other,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::RequestFailed(format!("HTTP {status}: {text}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        json["response"]
            .as_str()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| GenerationError::ParseError("missing `response` field".into()))
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GenerationError> {
        let start = Instant::now();
        let result = self.runtime.block_on(self.request(prompt, timeout));
        match &result {
            Ok(text) => debug!(
                model = %self.model,
                chars = text.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Ollama generation completed"
            ),
            Err(e) => warn!(model = %self.model, error = %e, "Ollama generation failed"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// No backend
// ---------------------------------------------------------------------------

/// Backend used when generation is switched off. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGenerator;

impl Generator for UnavailableGenerator {
    fn generate(&self, _prompt: &str, _timeout: Duration) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable("no generation backend configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(5);

    #[test]
    fn empty_program_is_rejected() {
        assert!(matches!(
            CommandGenerator::new("  ", vec![]),
            Err(GenerationError::Config(_))
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let generator = CommandGenerator::new("definitely-not-a-real-binary-3f9a", vec![])
            .expect("construct");
        assert!(matches!(
            generator.generate("hello", T),
            Err(GenerationError::Spawn(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_stdout_is_trimmed() {
        let generator = CommandGenerator::new("echo", vec![]).expect("construct");
        let text = generator.generate("  good morning  ", T).expect("echo runs");
        assert_eq!(text, "good morning");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let generator = CommandGenerator::new("sh", vec!["-c".into(), "exit 3".into()])
            .expect("construct");
        match generator.generate("ignored", T) {
            Err(GenerationError::NonZeroExit { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let generator = CommandGenerator::new("sh", vec!["-c".into(), "sleep 5".into()])
            .expect("construct");
        let result = generator.generate("ignored", Duration::from_millis(100));
        assert!(matches!(result, Err(GenerationError::Timeout(100))));
    }

    #[test]
    fn unavailable_backend_always_fails() {
        assert!(matches!(
            UnavailableGenerator.generate("hi", T),
            Err(GenerationError::Unavailable(_))
        ));
    }

    #[test]
    fn build_generator_honours_backend_kind() {
        let config = BackendConfig {
            backend: BackendKind::None,
            ..BackendConfig::default()
        };
        let generator = build_generator(&config).expect("build");
        assert!(generator.generate("hi", T).is_err());
    }
}
