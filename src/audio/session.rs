//! Recording lifecycle so the microphone is provably released the moment
//! capture ends, and the retry affordance can never drift from the attempt
//! counter.

use crate::audio::backend::{ActiveCapture, CaptureBackend, CaptureConstraints};
use crate::audio::format::{negotiate, AudioFormat};
use crate::error::Result;

/// Tagged recording state. Attempt counters live inside the state so the
/// displayed retry affordance is always derived from the same value the
/// budget enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Idle,
    Recording,
    /// A finalized blob exists and transcription has not started yet.
    Captured,
    Transcribing {
        attempt: u32,
    },
    Failed {
        attempt: u32,
        /// Terminal failures pin the session until a manual retry.
        terminal: bool,
    },
    Succeeded,
}

impl RecordingPhase {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingPhase::Recording)
    }

    pub fn is_transcribing(&self) -> bool {
        matches!(self, RecordingPhase::Transcribing { .. })
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, RecordingPhase::Failed { terminal: true, .. })
    }
}

/// One finalized recording: encoded bytes plus the negotiated format.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioBlob {
    /// Upload filename derived from the negotiated format.
    pub fn upload_name(&self) -> String {
        format!("recording.{}", self.format.extension())
    }
}

/// One full recording attempt, from microphone acquisition to a finalized
/// blob (and through transcription bookkeeping until reset).
pub struct CaptureSession {
    phase: RecordingPhase,
    format: Option<AudioFormat>,
    blob: Option<AudioBlob>,
    live: Option<Box<dyn ActiveCapture>>,
    last_error: Option<String>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            phase: RecordingPhase::Idle,
            format: None,
            blob: None,
            live: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn blob(&self) -> Option<&AudioBlob> {
        self.blob.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Live input level while recording.
    pub fn level_db(&self) -> Option<f32> {
        self.live.as_ref().and_then(|capture| capture.level_db())
    }

    /// Acquire the microphone and start recording.
    ///
    /// Any previous blob is discarded: a new recording supersedes the old
    /// capture. Starting while already recording is a no-op. On failure the
    /// phase stays `Idle` and the error is both surfaced and returned.
    pub fn start(
        &mut self,
        backend: &mut dyn CaptureBackend,
        constraints: &CaptureConstraints,
    ) -> Result<()> {
        if self.phase.is_recording() {
            tracing::warn!("start requested while already recording; ignoring");
            return Ok(());
        }
        let format = negotiate(|f| backend.supports(f), backend.native_format());
        match backend.open(constraints, format) {
            Ok(capture) => {
                self.live = Some(capture);
                self.format = Some(format);
                self.blob = None;
                self.last_error = None;
                self.phase = RecordingPhase::Recording;
                tracing::debug!("recording started ({})", format.mime());
                Ok(())
            }
            Err(err) => {
                self.phase = RecordingPhase::Idle;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Stop recording and finalize the blob.
    ///
    /// Valid only from `Recording`; calling it in any other phase is a no-op,
    /// not an error. The device stream is released unconditionally (the
    /// `finish` contract drops it before encoding runs), so no microphone
    /// handle survives this call. Returns whether a blob was produced.
    pub fn stop(&mut self) -> bool {
        if !self.phase.is_recording() {
            tracing::debug!("stop requested while not recording; ignoring");
            return false;
        }
        let Some(live) = self.live.take() else {
            // Recording phase without a live stream would be a logic error;
            // recover to idle rather than wedge the session.
            self.phase = RecordingPhase::Idle;
            return false;
        };
        let format = self.format.unwrap_or(AudioFormat::Wav);
        match live.finish() {
            Ok(bytes) => {
                self.blob = Some(AudioBlob { bytes, format });
                self.phase = RecordingPhase::Captured;
                true
            }
            Err(err) => {
                // Device already released by `finish`; without a blob there is
                // nothing to retry, so return to idle with a surfaced message.
                self.phase = RecordingPhase::Idle;
                self.last_error = Some(format!("recording could not be finalized: {err:#}"));
                false
            }
        }
    }

    /// Record that transcription attempt `attempt` is in flight.
    pub fn begin_attempt(&mut self, attempt: u32) {
        debug_assert!(self.blob.is_some());
        self.phase = RecordingPhase::Transcribing { attempt };
    }

    pub fn mark_failed(&mut self, attempt: u32, terminal: bool, message: impl Into<String>) {
        self.phase = RecordingPhase::Failed { attempt, terminal };
        self.last_error = Some(message.into());
    }

    pub fn mark_succeeded(&mut self) {
        self.phase = RecordingPhase::Succeeded;
        self.last_error = None;
    }

    /// Discard everything: abort a live stream if one exists, drop the blob,
    /// and return to idle. Used on merge completion and on user reset.
    pub fn reset(&mut self) {
        if let Some(live) = self.live.take() {
            live.abort();
        }
        self.phase = RecordingPhase::Idle;
        self.format = None;
        self.blob = None;
        self.last_error = None;
    }
}
