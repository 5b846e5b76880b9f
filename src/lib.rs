//! Voice-to-text capture and message composition for chat input surfaces.
//!
//! One control starts and stops a recording; the finalized audio blob ships
//! to a remote transcription endpoint; the resulting text merges into the
//! composed message, which can auto-submit. Retries are bounded and
//! explicit, and the microphone is released the instant recording ends.

pub mod audio;
pub mod compose;
pub mod config;
mod error;
pub mod ipc;
pub mod logging;
pub mod retry;
pub mod transcribe;
pub mod voice;

pub use compose::{Composer, ComposerEvent, ComposerOptions};
pub use error::{Error, Result};
pub use voice::{VoiceEvent, VoicePipeline};
