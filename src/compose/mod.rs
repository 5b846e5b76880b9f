//! The stateful façade chat surfaces bind to: reconciles voice output, file
//! attachments, and submission into one composed value.

pub mod affordance;
pub mod attachments;
pub mod controls;

use std::time::{Duration, Instant};

use affordance::{primary_action, PrimaryAction};
use attachments::{AcceptAll, AttachmentValidator, FileDescriptor};
use controls::{ExternalControls, VoiceControls};

use crate::config::{AppConfig, DEFAULT_AUTO_SUBMIT_DELAY_MS};
use crate::voice::{VoiceEvent, VoicePipeline};

/// Behavior switches for one composer instance.
#[derive(Debug, Clone)]
pub struct ComposerOptions {
    /// Submit the composed message automatically after a merged transcript.
    pub auto_submit: bool,
    /// Settle delay before the auto-submission fires, so the surface can
    /// render the merged value first.
    pub auto_submit_delay: Duration,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            auto_submit: false,
            auto_submit_delay: Duration::from_millis(DEFAULT_AUTO_SUBMIT_DELAY_MS),
        }
    }
}

impl From<&AppConfig> for ComposerOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            auto_submit: config.auto_submit,
            auto_submit_delay: config.auto_submit_delay(),
        }
    }
}

/// Notifications for the host surface, drained from every operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerEvent {
    /// Recording is live.
    VoiceStarted,
    /// Recording ended; `error` is the surfaced message when capture failed.
    VoiceEnded { error: Option<String> },
    /// Voice input cannot run at all (no device, no permission, or no voice
    /// configured). There is no retry affordance for these.
    VoiceUnavailable { message: String },
    /// Raw transcript, forwarded to the observer regardless of auto-submit.
    TranscriptObserved { text: String },
    /// A transcription attempt failed; terminal failures surface the manual
    /// retry affordance.
    VoiceFailed {
        attempt: u32,
        terminal: bool,
        message: String,
    },
    /// The composed text changed.
    Composed { text: String },
    /// The attachment list changed.
    AttachmentsChanged { attachments: Vec<FileDescriptor> },
    /// The validation collaborator rejected a selection.
    ValidationFailed { message: String },
    /// The composed message was submitted.
    Submitted {
        text: String,
        attachments: Vec<FileDescriptor>,
    },
}

/// Where this composer's voice capability comes from.
///
/// Both variants implement [`VoiceControls`]; external controls disable
/// internal capture entirely so one logical input never owns two sessions.
enum VoiceSource {
    Owned(VoicePipeline),
    External(ExternalControls),
}

impl VoiceSource {
    fn controls(&mut self) -> &mut dyn VoiceControls {
        match self {
            VoiceSource::Owned(pipeline) => pipeline,
            VoiceSource::External(controls) => controls,
        }
    }
}

/// The orchestrator each UI surface binds to. All mutation of the composed
/// value flows through these operations; no other component writes it.
pub struct Composer {
    text: String,
    attachments: Vec<FileDescriptor>,
    voice: Option<VoiceSource>,
    validator: Box<dyn AttachmentValidator>,
    options: ComposerOptions,
    pending_submit_at: Option<Instant>,
}

impl Composer {
    pub fn new(options: ComposerOptions) -> Self {
        Self {
            text: String::new(),
            attachments: Vec::new(),
            voice: None,
            validator: Box::new(AcceptAll),
            options,
            pending_submit_at: None,
        }
    }

    /// Attach an internally-owned voice pipeline.
    pub fn with_voice(mut self, pipeline: VoicePipeline) -> Self {
        self.voice = Some(VoiceSource::Owned(pipeline));
        self
    }

    /// Use parent-supplied voice controls. Replaces any internal pipeline:
    /// with external controls present, internal capture is disabled entirely.
    pub fn with_external_voice(mut self, controls: ExternalControls) -> Self {
        self.voice = Some(VoiceSource::External(controls));
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn AttachmentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[FileDescriptor] {
        &self.attachments
    }

    pub fn is_recording(&self) -> bool {
        match &self.voice {
            Some(VoiceSource::Owned(pipeline)) => pipeline.is_recording(),
            Some(VoiceSource::External(controls)) => controls.is_recording(),
            None => false,
        }
    }

    pub fn is_processing(&self) -> bool {
        match &self.voice {
            Some(VoiceSource::Owned(pipeline)) => pipeline.is_processing(),
            Some(VoiceSource::External(controls)) => controls.is_processing(),
            None => false,
        }
    }

    /// Live input level while recording (owned voice only).
    pub fn voice_level_db(&self) -> Option<f32> {
        match &self.voice {
            Some(VoiceSource::Owned(pipeline)) => pipeline.level_db(),
            _ => None,
        }
    }

    /// Derive the primary control's current intent. Pure; recomputed on
    /// every call from current state.
    pub fn primary_action(&self) -> PrimaryAction {
        primary_action(&self.text, self.is_recording(), self.is_processing())
    }

    /// Replace the composed text (typing path).
    pub fn set_text(&mut self, text: impl Into<String>) -> Vec<ComposerEvent> {
        let text = text.into();
        if text == self.text {
            return Vec::new();
        }
        self.text = text;
        vec![ComposerEvent::Composed {
            text: self.text.clone(),
        }]
    }

    pub fn start_voice(&mut self) -> Vec<ComposerEvent> {
        let Some(voice) = &mut self.voice else {
            return vec![ComposerEvent::VoiceUnavailable {
                message: "voice input is not configured".into(),
            }];
        };
        match voice.controls().start() {
            Ok(()) => vec![ComposerEvent::VoiceStarted],
            Err(err) => vec![ComposerEvent::VoiceUnavailable {
                message: err.to_string(),
            }],
        }
    }

    /// Stop a live recording; transcript/failure events arrive via `tick`.
    pub fn stop_voice(&mut self) {
        if let Some(voice) = &mut self.voice {
            voice.controls().stop();
        }
    }

    /// Manual retry after terminal failure (owned voice only; a parent
    /// owning the session also owns its retry affordance).
    pub fn retry_voice(&mut self) {
        match &mut self.voice {
            Some(VoiceSource::Owned(pipeline)) => pipeline.retry(),
            _ => tracing::debug!("retry ignored: no internally-owned voice session"),
        }
    }

    /// Explicit user reset: discard the voice session and any captured blob.
    pub fn reset_voice(&mut self) {
        if let Some(VoiceSource::Owned(pipeline)) = &mut self.voice {
            pipeline.reset();
        }
    }

    /// Merge a transcript into the composed text.
    ///
    /// Append with a single-space separator when text exists, replace when
    /// empty; never a silent overwrite. Surfaces in parent-supplied mode
    /// feed transcripts here directly; owned mode routes through `tick`.
    pub fn apply_transcript(&mut self, transcript: &str, now: Instant) -> Vec<ComposerEvent> {
        let mut events = vec![ComposerEvent::TranscriptObserved {
            text: transcript.to_string(),
        }];
        let merged = merge_transcript(&self.text, transcript);
        if merged != self.text {
            self.text = merged;
            events.push(ComposerEvent::Composed {
                text: self.text.clone(),
            });
            if self.options.auto_submit && !self.text.trim().is_empty() {
                self.pending_submit_at = Some(now + self.options.auto_submit_delay);
            }
        }
        events
    }

    /// Store a file selection after the validation collaborator has prepared
    /// it. Rejections never touch recording state.
    pub fn select_files(&mut self, files: Vec<FileDescriptor>) -> Vec<ComposerEvent> {
        match self.validator.validate(&files) {
            Ok(prepared) => {
                self.attachments.extend(prepared);
                vec![ComposerEvent::AttachmentsChanged {
                    attachments: self.attachments.clone(),
                }]
            }
            Err(err) => vec![ComposerEvent::ValidationFailed {
                message: err.to_string(),
            }],
        }
    }

    /// Remove by index; plain splice semantics.
    pub fn remove_file(&mut self, index: usize) -> Vec<ComposerEvent> {
        if index >= self.attachments.len() {
            tracing::warn!("remove_file index {index} out of bounds; ignoring");
            return Vec::new();
        }
        self.attachments.remove(index);
        vec![ComposerEvent::AttachmentsChanged {
            attachments: self.attachments.clone(),
        }]
    }

    /// Host-triggered submit of the current composed value.
    pub fn submit(&mut self) -> Vec<ComposerEvent> {
        self.fire_submit()
    }

    /// Advance time-driven work: drain voice events, merge arrived
    /// transcripts, and fire a due auto-submission.
    pub fn tick(&mut self, now: Instant) -> Vec<ComposerEvent> {
        let mut events = Vec::new();

        let voice_events = match &mut self.voice {
            Some(VoiceSource::Owned(pipeline)) => pipeline.poll(),
            _ => Vec::new(),
        };
        let mut transcripts = Vec::new();
        for event in voice_events {
            match event {
                VoiceEvent::CaptureEnded { error } => {
                    events.push(ComposerEvent::VoiceEnded { error });
                }
                VoiceEvent::TranscriptReady { transcript } => {
                    transcripts.push(transcript);
                }
                VoiceEvent::AttemptFailed {
                    attempt,
                    terminal,
                    message,
                } => {
                    events.push(ComposerEvent::VoiceFailed {
                        attempt,
                        terminal,
                        message,
                    });
                }
            }
        }
        for transcript in &transcripts {
            events.extend(self.apply_transcript(transcript.text(), now));
        }
        if !transcripts.is_empty() {
            // Successful merge destroys the voice session; the blob has
            // served its purpose.
            if let Some(VoiceSource::Owned(pipeline)) = &mut self.voice {
                pipeline.reset();
            }
        }

        if let Some(due) = self.pending_submit_at {
            if now >= due {
                events.extend(self.fire_submit());
            }
        }
        events
    }

    /// Submit and clear. The `Submitted` event carries the value; the text is
    /// cleared only after that event is materialized, never before.
    fn fire_submit(&mut self) -> Vec<ComposerEvent> {
        self.pending_submit_at = None;
        let text = self.text.trim().to_string();
        if text.is_empty() && self.attachments.is_empty() {
            return Vec::new();
        }
        let attachments = std::mem::take(&mut self.attachments);
        self.text.clear();
        vec![
            ComposerEvent::Submitted { text, attachments },
            ComposerEvent::Composed {
                text: String::new(),
            },
        ]
    }
}

/// Merge a transcript into the current value: replace when empty, append
/// with a single space otherwise. An empty transcript changes nothing.
fn merge_transcript(current: &str, transcript: &str) -> String {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return current.to_string();
    }
    let current = current.trim();
    if current.is_empty() {
        transcript.to_string()
    } else {
        format!("{current} {transcript}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::audio::backend::testing::ScriptedBackend;
    use crate::audio::{AudioBlob, CaptureConstraints};
    use crate::error::{Error, Result};
    use crate::transcribe::{Transcribe, Transcript};

    struct FixedTranscriber {
        outcomes: Mutex<Vec<Result<&'static str>>>,
    }

    impl FixedTranscriber {
        fn succeeding(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![Ok(text)]),
            })
        }

        fn failing_forever() -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transcribe for FixedTranscriber {
        fn transcribe(&self, _blob: &AudioBlob, _strip: bool) -> Result<Transcript> {
            match self.outcomes.lock().expect("outcomes").pop() {
                Some(Ok(text)) => Ok(Transcript {
                    raw: text.to_string(),
                    cleaned: text.to_string(),
                }),
                _ => Err(Error::transcription("scripted failure")),
            }
        }
    }

    fn owned_composer(options: ComposerOptions, transcriber: Arc<dyn Transcribe>) -> Composer {
        let pipeline = VoicePipeline::new(
            Box::new(ScriptedBackend::default()),
            transcriber,
            CaptureConstraints::default(),
            false,
        );
        Composer::new(options).with_voice(pipeline)
    }

    fn tick_until(
        composer: &mut Composer,
        pred: impl Fn(&[ComposerEvent]) -> bool,
    ) -> Vec<ComposerEvent> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(composer.tick(Instant::now()));
            if pred(&seen) {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out waiting for composer events; saw {seen:?}");
    }

    #[test]
    fn merge_replaces_empty_and_appends_with_separator() {
        assert_eq!(merge_transcript("", "hello"), "hello");
        assert_eq!(merge_transcript("draft", "hello"), "draft hello");
        assert_eq!(merge_transcript("draft ", " hello "), "draft hello");
        assert_eq!(merge_transcript("   ", "hello"), "hello");
    }

    #[test]
    fn merging_an_empty_transcript_never_changes_the_value() {
        assert_eq!(merge_transcript("draft", ""), "draft");
        assert_eq!(merge_transcript("draft", "   "), "draft");
        assert_eq!(merge_transcript("", ""), "");
    }

    #[test]
    fn transcript_appends_to_typed_text_without_overwrite() {
        let mut composer = Composer::new(ComposerOptions::default());
        composer.set_text("typed draft");
        let events = composer.apply_transcript("spoken words", Instant::now());
        assert_eq!(composer.text(), "typed draft spoken words");
        assert_eq!(
            events[0],
            ComposerEvent::TranscriptObserved {
                text: "spoken words".into()
            }
        );
    }

    #[test]
    fn observer_sees_raw_transcript_even_when_nothing_merges() {
        let mut composer = Composer::new(ComposerOptions::default());
        composer.set_text("draft");
        let events = composer.apply_transcript("   ", Instant::now());
        assert_eq!(
            events,
            vec![ComposerEvent::TranscriptObserved { text: "   ".into() }]
        );
        assert_eq!(composer.text(), "draft");
    }

    #[test]
    fn voice_to_text_end_to_end_with_merge() {
        let mut composer = owned_composer(
            ComposerOptions::default(),
            FixedTranscriber::succeeding("hello there"),
        );
        let events = composer.start_voice();
        assert_eq!(events, vec![ComposerEvent::VoiceStarted]);
        assert!(composer.is_recording());

        composer.stop_voice();
        let events = tick_until(&mut composer, |seen| {
            seen.iter()
                .any(|e| matches!(e, ComposerEvent::Composed { .. }))
        });
        assert!(events.contains(&ComposerEvent::VoiceEnded { error: None }));
        assert_eq!(composer.text(), "hello there");
        // Session destroyed after the merge.
        assert!(!composer.is_processing());
        assert!(!composer.is_recording());
    }

    #[test]
    fn terminal_failure_leaves_text_unchanged_and_surfaces_retry() {
        let mut composer = owned_composer(
            ComposerOptions::default(),
            FixedTranscriber::failing_forever(),
        );
        composer.set_text("draft");
        composer.start_voice();
        composer.stop_voice();

        let events = tick_until(&mut composer, |seen| {
            seen.iter()
                .any(|e| matches!(e, ComposerEvent::VoiceFailed { terminal: true, .. }))
        });
        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ComposerEvent::VoiceFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 3);
        assert_eq!(composer.text(), "draft");

        // No further automatic activity after terminal failure.
        thread::sleep(Duration::from_millis(50));
        assert!(composer.tick(Instant::now()).is_empty());
    }

    #[test]
    fn auto_submit_fires_after_delay_and_clears_after_submission() {
        let options = ComposerOptions {
            auto_submit: true,
            auto_submit_delay: Duration::from_millis(100),
        };
        let mut composer = Composer::new(options);
        let start = Instant::now();
        composer.apply_transcript("send me", start);
        assert_eq!(composer.text(), "send me");

        // Before the settle delay nothing fires and the text is intact.
        let events = composer.tick(start + Duration::from_millis(50));
        assert!(events.is_empty());
        assert_eq!(composer.text(), "send me");

        let events = composer.tick(start + Duration::from_millis(100));
        assert_eq!(
            events,
            vec![
                ComposerEvent::Submitted {
                    text: "send me".into(),
                    attachments: Vec::new()
                },
                ComposerEvent::Composed { text: String::new() },
            ]
        );
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn attachments_append_in_order_and_remove_by_index() {
        let mut composer = Composer::new(ComposerOptions::default());
        let file = |name: &str| FileDescriptor {
            name: name.into(),
            media_type: "application/pdf".into(),
            size: 10,
        };
        composer.select_files(vec![file("a"), file("b")]);
        composer.select_files(vec![file("c")]);
        assert_eq!(
            composer
                .attachments()
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );

        composer.remove_file(1);
        assert_eq!(
            composer
                .attachments()
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "c"]
        );

        // Out-of-bounds removal is ignored.
        assert!(composer.remove_file(7).is_empty());
    }

    #[test]
    fn validation_rejection_surfaces_without_touching_state() {
        struct RejectAll;
        impl AttachmentValidator for RejectAll {
            fn validate(&mut self, _files: &[FileDescriptor]) -> Result<Vec<FileDescriptor>> {
                Err(Error::validation("too many pages"))
            }
        }

        let mut composer =
            Composer::new(ComposerOptions::default()).with_validator(Box::new(RejectAll));
        composer.set_text("draft");
        let events = composer.select_files(vec![FileDescriptor {
            name: "big.pdf".into(),
            media_type: "application/pdf".into(),
            size: 1 << 20,
        }]);
        assert_eq!(
            events,
            vec![ComposerEvent::ValidationFailed {
                message: "too many pages".into()
            }]
        );
        assert!(composer.attachments().is_empty());
        assert_eq!(composer.text(), "draft");
    }

    #[test]
    fn submitted_value_carries_attachments_and_clears_both() {
        let mut composer = Composer::new(ComposerOptions::default());
        composer.set_text("message");
        composer.select_files(vec![FileDescriptor {
            name: "a.png".into(),
            media_type: "image/png".into(),
            size: 1,
        }]);
        let events = composer.submit();
        let ComposerEvent::Submitted { text, attachments } = &events[0] else {
            panic!("expected submission, got {events:?}");
        };
        assert_eq!(text, "message");
        assert_eq!(attachments.len(), 1);
        assert!(composer.text().is_empty());
        assert!(composer.attachments().is_empty());
    }

    #[test]
    fn external_controls_replace_internal_capture() {
        let recording = Arc::new(AtomicBool::new(false));
        let processing = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));

        let start_flag = Arc::clone(&started);
        let recording_for_hook = Arc::clone(&recording);
        let controls = ExternalControls::new(
            Arc::clone(&recording),
            Arc::clone(&processing),
            move || {
                start_flag.store(true, Ordering::SeqCst);
                recording_for_hook.store(true, Ordering::SeqCst);
                Ok(())
            },
            || {},
        );

        let mut composer = Composer::new(ComposerOptions::default()).with_external_voice(controls);
        let events = composer.start_voice();
        assert_eq!(events, vec![ComposerEvent::VoiceStarted]);
        assert!(started.load(Ordering::SeqCst));
        assert!(composer.is_recording());

        // The parent feeds transcripts directly; ticking produces nothing.
        assert!(composer.tick(Instant::now()).is_empty());
        composer.apply_transcript("from parent", Instant::now());
        assert_eq!(composer.text(), "from parent");
    }

    #[test]
    fn start_without_voice_surfaces_unavailable() {
        let mut composer = Composer::new(ComposerOptions::default());
        let events = composer.start_voice();
        assert!(matches!(
            events.as_slice(),
            [ComposerEvent::VoiceUnavailable { .. }]
        ));
    }

    #[test]
    fn device_failure_surfaces_unavailable_message() {
        let pipeline = VoicePipeline::new(
            Box::new(ScriptedBackend {
                fail_open: Some("permission denied".into()),
                ..ScriptedBackend::default()
            }),
            FixedTranscriber::failing_forever() as Arc<dyn Transcribe>,
            CaptureConstraints::default(),
            false,
        );
        let mut composer = Composer::new(ComposerOptions::default()).with_voice(pipeline);
        let events = composer.start_voice();
        let [ComposerEvent::VoiceUnavailable { message }] = events.as_slice() else {
            panic!("expected unavailable, got {events:?}");
        };
        assert!(message.contains("microphone could not be activated"));
    }
}
