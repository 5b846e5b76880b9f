//! Voice-control capability seam so one recording session can serve several
//! rendering surfaces without duplicating capture logic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::voice::VoicePipeline;

/// The capability a surface needs from its record control.
///
/// Satisfied either by the composer's own pipeline or by controls forwarded
/// from an enclosing surface; a surface never needs to know which.
pub trait VoiceControls {
    fn is_recording(&self) -> bool;
    fn is_processing(&self) -> bool;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
}

impl VoiceControls for VoicePipeline {
    fn is_recording(&self) -> bool {
        VoicePipeline::is_recording(self)
    }

    fn is_processing(&self) -> bool {
        VoicePipeline::is_processing(self)
    }

    fn start(&mut self) -> Result<()> {
        self.start_recording()
    }

    fn stop(&mut self) {
        self.stop_recording();
    }
}

/// Parent-supplied controls: shared state flags plus start/stop hooks owned
/// by an enclosing surface. When these are present the composer runs no
/// capture of its own, so at most one session exists per logical input.
pub struct ExternalControls {
    recording: Arc<AtomicBool>,
    processing: Arc<AtomicBool>,
    start: Box<dyn FnMut() -> Result<()>>,
    stop: Box<dyn FnMut()>,
}

impl ExternalControls {
    pub fn new(
        recording: Arc<AtomicBool>,
        processing: Arc<AtomicBool>,
        start: impl FnMut() -> Result<()> + 'static,
        stop: impl FnMut() + 'static,
    ) -> Self {
        Self {
            recording,
            processing,
            start: Box::new(start),
            stop: Box::new(stop),
        }
    }
}

impl VoiceControls for ExternalControls {
    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    fn start(&mut self) -> Result<()> {
        (self.start)()
    }

    fn stop(&mut self) {
        (self.stop)()
    }
}
