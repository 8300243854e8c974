//! Shared handle to the text generation backend.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use village_llm::{GenerationError, Generator, PromptId};

/// A generator plus the timeout every call carries.
///
/// Cheap to clone; agents and their memory stores each hold one.
#[derive(Clone)]
pub struct Backend {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// Wrap `generator`, bounding every call by `timeout`.
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render `prompt` with `vars` and generate a completion.
    ///
    /// # Errors
    ///
    /// Passes through the backend's [`GenerationError`].
    pub fn generate(&self, prompt: PromptId, vars: &[(&str, &str)]) -> Result<String, GenerationError> {
        let start = Instant::now();
        let text = self.generator.generate(&prompt.render(vars), self.timeout);
        debug!(
            prompt = %prompt,
            ok = text.is_ok(),
            elapsed_ms = start.elapsed().as_millis(),
            "Generation call finished"
        );
        text
    }
}
