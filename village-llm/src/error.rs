//! Generation error types.

use thiserror::Error;

/// Reply used when the backend ran but exited unsuccessfully.
pub const FALLBACK_UNPROCESSED: &str = "I'm sorry, I couldn't process that.";

/// Reply used for every other backend failure (spawn error, timeout, I/O).
pub const FALLBACK_WENT_WRONG: &str = "I'm sorry, something went wrong.";

/// Errors that can occur while asking a backend for text.
///
/// `Clone` so scripted backends can replay the same failure.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The backend process could not be started.
    #[error("failed to start generation process: {0}")]
    Spawn(String),

    /// The backend process ran but exited with a non-zero status.
    #[error("generation process exited with status {code:?}: {stderr}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The backend did not answer within the allotted time.
    #[error("generation timed out after {0}ms")]
    Timeout(u64),

    /// HTTP request failed.
    #[error("generation request failed: {0}")]
    RequestFailed(String),

    /// The backend answered with something that could not be decoded.
    #[error("failed to parse generation response: {0}")]
    ParseError(String),

    /// No backend is reachable or configured.
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    /// Backend configuration is invalid.
    #[error("generation configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    /// The in-character line an NPC says instead of the generated text.
    #[must_use]
    pub fn fallback_utterance(&self) -> &'static str {
        match self {
            Self::NonZeroExit { .. } => FALLBACK_UNPROCESSED,
            _ => FALLBACK_WENT_WRONG,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(0)
        } else if err.is_connect() {
            GenerationError::Unavailable(err.to_string())
        } else {
            GenerationError::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_uses_unprocessed_fallback() {
        let err = GenerationError::NonZeroExit {
            code: Some(1),
            stderr: "model not found".into(),
        };
        assert_eq!(err.fallback_utterance(), FALLBACK_UNPROCESSED);
    }

    #[test]
    fn other_failures_use_generic_fallback() {
        assert_eq!(
            GenerationError::Timeout(30_000).fallback_utterance(),
            FALLBACK_WENT_WRONG
        );
        assert_eq!(
            GenerationError::Spawn("no such file".into()).fallback_utterance(),
            FALLBACK_WENT_WRONG
        );
    }
}
