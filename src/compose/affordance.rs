//! Primary-button derivation so the control's intent is always a pure
//! function of current state, with no state of its own.

/// What the single primary control should do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIntent {
    Submit,
    StartRecording,
    StopRecording,
}

impl PrimaryIntent {
    /// Stable label for the host protocol.
    pub fn label(&self) -> &'static str {
        match self {
            PrimaryIntent::Submit => "submit",
            PrimaryIntent::StartRecording => "start_recording",
            PrimaryIntent::StopRecording => "stop_recording",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryAction {
    pub intent: PrimaryIntent,
    /// False while a transcription is in flight, whatever the intent:
    /// starting a new recording mid-transcription is never offered.
    pub enabled: bool,
}

/// Derive the primary action from `(text, recording, transcribing)`.
pub fn primary_action(text: &str, recording: bool, transcribing: bool) -> PrimaryAction {
    let intent = if !text.trim().is_empty() {
        PrimaryIntent::Submit
    } else if recording {
        PrimaryIntent::StopRecording
    } else {
        PrimaryIntent::StartRecording
    };
    PrimaryAction {
        intent,
        enabled: !transcribing,
    }
}
