//! The `Generator` seam and a scripted backend for tests and offline runs.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::GenerationError;

/// Anything that turns a prompt into text.
///
/// Calls are blocking and must honour `timeout`: a backend that exits
/// unsuccessfully or runs out of time returns `Err`, never an empty string.
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the backend is unreachable,
    /// exits unsuccessfully, or exceeds `timeout`.
    fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GenerationError>;
}

/// Deterministic backend that replays queued replies in order.
///
/// Once the queue is empty it answers every prompt with `default_reply`.
/// Every prompt it receives is kept so tests can inspect it.
#[derive(Debug)]
pub struct ScriptedGenerator {
    inner: Mutex<ScriptedInner>,
}

#[derive(Debug)]
struct ScriptedInner {
    replies: VecDeque<Result<String, GenerationError>>,
    default_reply: Result<String, GenerationError>,
    prompts: Vec<String>,
}

impl ScriptedGenerator {
    /// A backend that answers every prompt with `reply`.
    #[must_use]
    pub fn always(reply: impl Into<String>) -> Self {
        Self::with_default(Ok(reply.into()))
    }

    /// A backend whose every call fails with `err`.
    #[must_use]
    pub fn failing(err: GenerationError) -> Self {
        Self::with_default(Err(err))
    }

    fn with_default(default_reply: Result<String, GenerationError>) -> Self {
        Self {
            inner: Mutex::new(ScriptedInner {
                replies: VecDeque::new(),
                default_reply,
                prompts: Vec::new(),
            }),
        }
    }

    /// Queue a reply to be returned before the default.
    #[must_use]
    pub fn then(self, reply: Result<String, GenerationError>) -> Self {
        self.push(reply);
        self
    }

    /// Queue a reply on a shared handle.
    pub fn push(&self, reply: Result<String, GenerationError>) {
        self.inner.lock().replies.push_back(reply);
    }

    /// All prompts received so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.inner.lock().prompts.clone()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.lock().prompts.len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str, _timeout: Duration) -> Result<String, GenerationError> {
        let mut inner = self.inner.lock();
        inner.prompts.push(prompt.to_string());
        match inner.replies.pop_front() {
            Some(reply) => reply,
            None => inner.default_reply.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn replays_queue_then_default() {
        let generator = ScriptedGenerator::always("default")
            .then(Ok("first".into()))
            .then(Err(GenerationError::Timeout(10)));

        assert_eq!(generator.generate("a", T).expect("first"), "first");
        assert!(matches!(
            generator.generate("b", T),
            Err(GenerationError::Timeout(10))
        ));
        assert_eq!(generator.generate("c", T).expect("default"), "default");
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failing_backend_always_errors() {
        let generator = ScriptedGenerator::failing(GenerationError::Unavailable("offline".into()));
        for _ in 0..3 {
            assert!(generator.generate("hello", T).is_err());
        }
        assert_eq!(generator.call_count(), 3);
    }
}
