use thiserror::Error;

/// Everything that can go wrong while driving a conversation against the
/// assistants service. All variants are recoverable at the session
/// boundary: the UI layer maps each to a user-facing fallback string via
/// [`ChatError::user_message`] and keeps the session alive.
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Transport ────────────────────────────────────────────────────────
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    // ── Service-reported errors (well-formed error envelope) ─────────────
    #[error("api error ({error_type}): {message}")]
    Api {
        message: String,
        error_type: String,
        param: Option<String>,
        code: Option<String>,
    },

    // ── Schema errors ────────────────────────────────────────────────────
    #[error("failed to decode response: {reason}; body: {body}")]
    Decode { reason: String, body: String },

    // ── Orchestration errors ─────────────────────────────────────────────
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error("run ended with status '{status}'")]
    RunEnded { status: String },

    #[error("run still not finished after {attempts} status checks")]
    RunTimedOut { attempts: usize },
}

impl ChatError {
    /// The literal text shown to the user in place of an assistant reply
    /// when this error aborts a turn.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::Network(_) => "Failed to reach the assistant. Please try again.",
            ChatError::Api { .. } => "Failed to process the message.",
            ChatError::Decode { .. } => "Received an unexpected reply. Please try again.",
            ChatError::Precondition(_) => "The conversation is not ready yet.",
            ChatError::RunEnded { .. } => "Failed to process the message.",
            ChatError::RunTimedOut { .. } => "The assistant is taking too long. Please try again.",
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, ChatError::Precondition(_))
    }
}
