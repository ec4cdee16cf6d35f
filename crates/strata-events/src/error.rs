//! Error type returned by event listeners.

/// A failure raised inside a single listener invocation.
///
/// The bus catches these (and panics, which it converts into
/// [`ListenerError::Panicked`]) so they never reach the publisher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// The listener reported a failure.
    #[error("listener failed: {0}")]
    Failed(String),

    /// The listener panicked; the payload message is captured if it was a string.
    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
