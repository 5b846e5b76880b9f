//! Microphone capture: device seam, format negotiation, and the recording
//! session lifecycle.

/// Sample rate requested from the capture device.
pub const SAMPLE_RATE: u32 = 16_000;

pub mod backend;
pub mod format;
pub mod level;
pub mod session;

pub use backend::{ActiveCapture, CaptureBackend, CaptureConstraints, CpalBackend};
pub use format::AudioFormat;
pub use session::{AudioBlob, CaptureSession, RecordingPhase};
