//! Capture-to-transcript pipeline so one input surface never runs two
//! recordings or two in-flight transcription calls.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::audio::{CaptureBackend, CaptureConstraints, CaptureSession, RecordingPhase};
use crate::error::{Error, Result};
use crate::retry::{AttemptBudget, MAX_ATTEMPTS};
use crate::transcribe::{Transcribe, Transcript};

/// Pipeline notifications drained by the orchestrator each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// Recording ended. `error` carries the surfaced message when no blob was
    /// produced.
    CaptureEnded { error: Option<String> },
    /// A transcript arrived for the current blob.
    TranscriptReady { transcript: Transcript },
    /// A transcription attempt failed. Non-terminal failures are followed by
    /// an automatic attempt; terminal ones surface the manual retry
    /// affordance.
    AttemptFailed {
        attempt: u32,
        terminal: bool,
        message: String,
    },
}

/// One in-flight transcription call, reporting over its own channel.
///
/// Dropping the job is how a superseded session discards a result: the
/// worker finishes, its send fails, and the transcript goes nowhere.
struct TranscriptionJob {
    receiver: Receiver<Result<Transcript>>,
    attempt: u32,
}

/// Owns the recording session, the attempt budget, and at most one
/// transcription job at a time.
pub struct VoicePipeline {
    backend: Box<dyn CaptureBackend>,
    transcriber: Arc<dyn Transcribe>,
    constraints: CaptureConstraints,
    strip_timestamps: bool,
    session: CaptureSession,
    budget: AttemptBudget,
    job: Option<TranscriptionJob>,
    /// Events produced outside `poll`, delivered on the next drain.
    pending: Vec<VoiceEvent>,
}

impl VoicePipeline {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        transcriber: Arc<dyn Transcribe>,
        constraints: CaptureConstraints,
        strip_timestamps: bool,
    ) -> Self {
        Self {
            backend,
            transcriber,
            constraints,
            strip_timestamps,
            session: CaptureSession::new(),
            budget: AttemptBudget::new(),
            job: None,
            pending: Vec::new(),
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.session.phase()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.session.last_error()
    }

    /// Live input level while recording.
    pub fn level_db(&self) -> Option<f32> {
        self.session.level_db()
    }

    pub fn is_recording(&self) -> bool {
        self.session.phase().is_recording()
    }

    /// Whether a transcription call is in flight.
    pub fn is_processing(&self) -> bool {
        self.job.is_some()
    }

    /// Acquire the microphone and start a new recording.
    ///
    /// A new recording supersedes the previous session entirely: any
    /// in-flight transcription result will be discarded on arrival.
    pub fn start_recording(&mut self) -> Result<()> {
        if self.session.phase().is_recording() {
            tracing::warn!("start requested while already recording; ignoring");
            return Ok(());
        }
        if self.job.take().is_some() {
            tracing::debug!("new recording supersedes in-flight transcription");
        }
        self.budget.reset();
        self.session.reset();
        // Stale events belong to the superseded session.
        self.pending.clear();
        self.session.start(self.backend.as_mut(), &self.constraints)
    }

    /// Stop recording; releases the device and, when a blob was finalized,
    /// issues the first transcription attempt automatically. The resulting
    /// events arrive on the next `poll`.
    pub fn stop_recording(&mut self) {
        if !self.session.phase().is_recording() {
            return;
        }
        if self.session.stop() {
            self.pending.push(VoiceEvent::CaptureEnded { error: None });
            self.spawn_attempt();
        } else {
            self.pending.push(VoiceEvent::CaptureEnded {
                error: self.session.last_error().map(str::to_string),
            });
        }
    }

    /// Manual retry after terminal failure: fresh budget, same blob, no new
    /// recording. A retry without a captured blob is a no-op.
    pub fn retry(&mut self) {
        if !self.session.phase().is_terminal_failure() {
            tracing::debug!("retry requested outside terminal failure; ignoring");
            return;
        }
        if self.session.blob().is_none() {
            tracing::debug!("retry requested without a captured blob; ignoring");
            return;
        }
        self.budget.reset();
        self.spawn_attempt();
    }

    /// Drop the whole session: abort a live capture, discard the blob, and
    /// orphan any in-flight transcription so its result is discarded.
    pub fn reset(&mut self) {
        if self.job.take().is_some() {
            tracing::debug!("reset discards in-flight transcription");
        }
        self.budget.reset();
        self.session.reset();
        self.pending.clear();
    }

    /// Drain pending events and job completion without blocking. Failures
    /// re-issue automatically while the budget allows; the final failure is
    /// terminal.
    pub fn poll(&mut self) -> Vec<VoiceEvent> {
        let mut events = std::mem::take(&mut self.pending);
        let Some(job) = &self.job else {
            return events;
        };
        let outcome = match job.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return events,
            Err(TryRecvError::Disconnected) => {
                Err(Error::transcription("transcription worker disconnected"))
            }
        };
        let attempt = job.attempt;
        self.job = None;

        match outcome {
            Ok(transcript) => {
                self.session.mark_succeeded();
                events.push(VoiceEvent::TranscriptReady { transcript });
            }
            Err(err) => {
                let message = err.to_string();
                let terminal = !self.budget.can_retry();
                self.session.mark_failed(attempt, terminal, message.clone());
                events.push(VoiceEvent::AttemptFailed {
                    attempt,
                    terminal,
                    message,
                });
                if !terminal {
                    self.spawn_attempt();
                }
            }
        }
        events
    }

    fn spawn_attempt(&mut self) {
        debug_assert!(self.job.is_none());
        let Some(blob) = self.session.blob() else {
            return;
        };
        let blob = blob.clone();
        let attempt = self.budget.begin_attempt();
        self.session.begin_attempt(attempt);

        let (tx, rx) = mpsc::channel();
        let transcriber = Arc::clone(&self.transcriber);
        let strip = self.strip_timestamps;
        thread::spawn(move || {
            let outcome = transcriber.transcribe(&blob, strip);
            // The receiver is gone when the session was superseded; the
            // result is discarded with it.
            let _ = tx.send(outcome);
        });
        self.job = Some(TranscriptionJob {
            receiver: rx,
            attempt,
        });
        tracing::debug!("transcription attempt {attempt} of {MAX_ATTEMPTS} issued");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::audio::backend::testing::ScriptedBackend;
    use crate::audio::AudioBlob;

    enum Scripted {
        Text(&'static str),
        Failure(&'static str),
    }

    #[derive(Default)]
    struct ScriptedTranscriber {
        outcomes: Mutex<VecDeque<Scripted>>,
        calls: AtomicU32,
        delay: Option<Duration>,
        uploads: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl ScriptedTranscriber {
        fn with_outcomes(outcomes: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Self::default()
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transcribe for ScriptedTranscriber {
        fn transcribe(&self, blob: &AudioBlob, _strip: bool) -> Result<Transcript> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.uploads
                .lock()
                .expect("uploads lock")
                .push((blob.upload_name(), blob.bytes.clone()));
            match self.outcomes.lock().expect("outcomes lock").pop_front() {
                Some(Scripted::Text(text)) => Ok(Transcript {
                    raw: text.to_string(),
                    cleaned: text.to_string(),
                }),
                Some(Scripted::Failure(message)) => Err(Error::transcription(message)),
                None => Err(Error::transcription("no scripted outcome left")),
            }
        }
    }

    fn pipeline_with(transcriber: Arc<ScriptedTranscriber>) -> VoicePipeline {
        VoicePipeline::new(
            Box::new(ScriptedBackend::default()),
            transcriber,
            CaptureConstraints::default(),
            false,
        )
    }

    fn drain_until(
        pipeline: &mut VoicePipeline,
        pred: impl Fn(&[VoiceEvent]) -> bool,
    ) -> Vec<VoiceEvent> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(pipeline.poll());
            if pred(&seen) {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out waiting for pipeline events; saw {seen:?}");
    }

    #[test]
    fn capture_then_single_automatic_transcription() {
        let transcriber = ScriptedTranscriber::with_outcomes(vec![Scripted::Text("hello")]);
        let mut pipeline = pipeline_with(Arc::clone(&transcriber));

        pipeline.start_recording().expect("start");
        assert!(pipeline.is_recording());
        pipeline.stop_recording();
        assert!(pipeline.is_processing());

        let events = drain_until(&mut pipeline, |seen| {
            seen.iter()
                .any(|e| matches!(e, VoiceEvent::TranscriptReady { .. }))
        });
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(pipeline.phase(), RecordingPhase::Succeeded);
        assert_eq!(events[0], VoiceEvent::CaptureEnded { error: None });
        let VoiceEvent::TranscriptReady { transcript } = &events[1] else {
            panic!("expected transcript, got {events:?}");
        };
        assert_eq!(transcript.text(), "hello");
    }

    #[test]
    fn three_failures_reach_terminal_and_stop_retrying() {
        let transcriber = ScriptedTranscriber::with_outcomes(vec![
            Scripted::Failure("boom 1"),
            Scripted::Failure("boom 2"),
            Scripted::Failure("boom 3"),
        ]);
        let mut pipeline = pipeline_with(Arc::clone(&transcriber));

        pipeline.start_recording().expect("start");
        pipeline.stop_recording();
        let events = drain_until(&mut pipeline, |seen| {
            seen.iter()
                .any(|e| matches!(e, VoiceEvent::AttemptFailed { terminal: true, .. }))
        });

        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, VoiceEvent::AttemptFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 3);
        assert_eq!(transcriber.calls(), 3);
        assert_eq!(
            pipeline.phase(),
            RecordingPhase::Failed {
                attempt: 3,
                terminal: true
            }
        );

        // Terminal failure pins the session: no further automatic attempts.
        thread::sleep(Duration::from_millis(50));
        assert!(pipeline.poll().is_empty());
        assert_eq!(transcriber.calls(), 3);
    }

    #[test]
    fn manual_retry_reuses_the_original_blob() {
        let transcriber = ScriptedTranscriber::with_outcomes(vec![
            Scripted::Failure("boom 1"),
            Scripted::Failure("boom 2"),
            Scripted::Failure("boom 3"),
            Scripted::Text("recovered"),
        ]);
        let mut pipeline = pipeline_with(Arc::clone(&transcriber));

        pipeline.start_recording().expect("start");
        pipeline.stop_recording();
        drain_until(&mut pipeline, |seen| {
            seen.iter()
                .any(|e| matches!(e, VoiceEvent::AttemptFailed { terminal: true, .. }))
        });

        pipeline.retry();
        assert!(pipeline.is_processing());
        drain_until(&mut pipeline, |seen| {
            seen.iter()
                .any(|e| matches!(e, VoiceEvent::TranscriptReady { .. }))
        });

        assert_eq!(transcriber.calls(), 4);
        let uploads = transcriber.uploads.lock().expect("uploads");
        let (first_name, first_bytes) = &uploads[0];
        let (retry_name, retry_bytes) = &uploads[3];
        assert_eq!(first_name, retry_name);
        assert_eq!(first_bytes, retry_bytes);
    }

    #[test]
    fn retry_without_blob_is_a_noop() {
        let transcriber = ScriptedTranscriber::with_outcomes(vec![]);
        let mut pipeline = pipeline_with(Arc::clone(&transcriber));
        pipeline.retry();
        assert!(!pipeline.is_processing());
        assert_eq!(transcriber.calls(), 0);
    }

    #[test]
    fn new_recording_discards_in_flight_result() {
        let transcriber = Arc::new(ScriptedTranscriber {
            outcomes: Mutex::new(VecDeque::from([Scripted::Text("stale")])),
            delay: Some(Duration::from_millis(50)),
            ..ScriptedTranscriber::default()
        });
        let mut pipeline = pipeline_with(Arc::clone(&transcriber));

        pipeline.start_recording().expect("start");
        pipeline.stop_recording();
        assert!(pipeline.is_processing());

        // Supersede before the slow worker finishes.
        pipeline.start_recording().expect("restart");
        assert!(!pipeline.is_processing());

        thread::sleep(Duration::from_millis(150));
        assert!(pipeline.poll().is_empty());
        assert_eq!(transcriber.calls(), 1);
    }

    #[test]
    fn failed_capture_surfaces_error_without_transcription() {
        let transcriber = ScriptedTranscriber::with_outcomes(vec![]);
        let mut pipeline = VoicePipeline::new(
            Box::new(ScriptedBackend {
                fail_finish: true,
                ..ScriptedBackend::default()
            }),
            Arc::clone(&transcriber) as Arc<dyn Transcribe>,
            CaptureConstraints::default(),
            false,
        );

        pipeline.start_recording().expect("start");
        pipeline.stop_recording();
        let events = pipeline.poll();
        assert!(matches!(
            events.as_slice(),
            [VoiceEvent::CaptureEnded { error: Some(_) }]
        ));
        assert!(!pipeline.is_processing());
        assert_eq!(transcriber.calls(), 0);
    }
}
