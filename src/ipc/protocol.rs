//! Typed JSON protocol so host surfaces exchange stable contracts with the
//! composer.
//!
//! Messages are newline-delimited JSON: commands arrive on stdin, events
//! leave on stdout. Nothing is persisted; nothing survives a restart.

use serde::{Deserialize, Serialize};

use crate::compose::attachments::FileDescriptor;

// ============================================================================
// Events (composer → host surface)
// ============================================================================

/// Events emitted to the host surface.
///
/// Serialized as JSON with an `"event"` tag field for type discrimination.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum IpcEvent {
    /// Sent once on startup (and on request) with capability information.
    #[serde(rename = "capabilities")]
    Capabilities {
        /// Semantic version of this backend.
        version: String,
        /// Whether microphone capture is currently available.
        mic_available: bool,
        /// Configured input-device label, when one is pinned.
        input_device: Option<String>,
        /// Transcription endpoint in use.
        endpoint: String,
        /// Whether timestamp stripping is requested.
        strip_timestamps: bool,
        /// Whether auto-submit-on-voice is enabled.
        auto_submit: bool,
    },

    /// Voice capture started.
    #[serde(rename = "voice_start")]
    VoiceStart,

    /// Live input level while recording, in dBFS. Emitted only when the
    /// reading changes.
    #[serde(rename = "voice_level")]
    VoiceLevel { db: f32 },

    /// Voice capture ended.
    #[serde(rename = "voice_end")]
    VoiceEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        /// Surfaced message when capture produced no blob.
        error: Option<String>,
    },

    /// Voice input cannot run: permission denied, no device, or voice not
    /// configured. No retry affordance applies.
    #[serde(rename = "voice_unavailable")]
    VoiceUnavailable {
        /// Permission-explanation message for the user.
        message: String,
    },

    /// Raw transcript from a completed transcription, emitted regardless of
    /// auto-submit so external observers always see it.
    #[serde(rename = "transcript")]
    Transcript {
        /// Final transcript text.
        text: String,
    },

    /// A transcription attempt failed.
    #[serde(rename = "transcript_failed")]
    TranscriptFailed {
        /// 1-based attempt number that failed.
        attempt: u32,
        /// True once the attempt budget is exhausted; the surface should
        /// show the manual retry control.
        terminal: bool,
        /// Surfaced failure message.
        message: String,
    },

    /// The composed text changed. Carries the derived primary action so the
    /// surface never computes it independently.
    #[serde(rename = "composed")]
    Composed {
        text: String,
        attachment_count: usize,
        /// `submit`, `start_recording`, or `stop_recording`.
        primary_action: String,
        /// False while a transcription is in flight.
        action_enabled: bool,
    },

    /// The attachment list changed.
    #[serde(rename = "attachments")]
    Attachments { attachments: Vec<FileDescriptor> },

    /// The validation collaborator rejected a file selection.
    #[serde(rename = "validation_failed")]
    ValidationFailed { message: String },

    /// The composed message was submitted.
    #[serde(rename = "submitted")]
    Submitted {
        text: String,
        attachments: Vec<FileDescriptor>,
    },

    /// Error outside the voice/validation taxonomy (e.g. a malformed
    /// command).
    #[serde(rename = "error")]
    Error {
        message: String,
        /// Whether the session can continue.
        recoverable: bool,
    },
}

// ============================================================================
// Commands (host surface → composer)
// ============================================================================

/// Commands received from the host surface. Tagged with `"cmd"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum IpcCommand {
    /// Replace the composed text (typing path).
    #[serde(rename = "set_text")]
    SetText { text: String },

    /// Start voice capture.
    #[serde(rename = "start_voice")]
    StartVoice,

    /// Stop voice capture and transcribe the recording.
    #[serde(rename = "stop_voice")]
    StopVoice,

    /// Manual retry after terminal transcription failure.
    #[serde(rename = "retry_voice")]
    RetryVoice,

    /// Discard the voice session, captured audio included.
    #[serde(rename = "reset_voice")]
    ResetVoice,

    /// Attach files (validated by the external collaborator).
    #[serde(rename = "attach_files")]
    AttachFiles { files: Vec<FileDescriptor> },

    /// Remove one attachment by index.
    #[serde(rename = "remove_file")]
    RemoveFile { index: usize },

    /// Submit the current composed value.
    #[serde(rename = "submit")]
    Submit,

    /// Re-emit the capabilities event.
    #[serde(rename = "get_capabilities")]
    GetCapabilities,

    /// End the session.
    #[serde(rename = "exit")]
    Exit,
}
