use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the capture/transcription/compose flow.
///
/// Every variant maps to a user-visible message; async boundaries convert
/// these into surfaced state instead of letting them escape into the host UI.
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone permission was denied or no input device exists.
    /// Not retryable without a permission or hardware change.
    #[error("microphone could not be activated: {reason}")]
    DeviceUnavailable { reason: String },

    /// The transcription call did not produce usable text: transport error,
    /// non-2xx status, `success: false`, or a missing/empty text field.
    /// Retryable within the attempt budget.
    #[error("transcription failed: {reason}")]
    TranscriptionFailed { reason: String },

    /// An attachment was rejected by the validation collaborator.
    /// Never affects recording state.
    #[error("{message}")]
    Validation { message: String },
}

impl Error {
    pub fn device(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn transcription(reason: impl Into<String>) -> Self {
        Self::TranscriptionFailed {
            reason: reason.into(),
        }
    }

    /// Constructor for validation collaborators; `message` is shown to the
    /// user as-is.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether a manual retry affordance makes sense for this failure.
    /// Device failures would fail identically without a permission change.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::TranscriptionFailed { .. })
    }
}
