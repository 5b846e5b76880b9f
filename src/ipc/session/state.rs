use std::sync::Arc;

use super::{send_event, IpcState};
use crate::audio::{CaptureConstraints, CpalBackend};
use crate::compose::{Composer, ComposerOptions};
use crate::config::AppConfig;
use crate::ipc::protocol::IpcEvent;
use crate::transcribe::HttpTranscriber;
use crate::voice::VoicePipeline;

impl IpcState {
    pub(super) fn new(config: AppConfig) -> Self {
        let options = ComposerOptions::from(&config);

        // Voice is optional: a bad endpoint configuration still leaves the
        // text/attachment flow usable, with voice surfaced as unavailable.
        let composer = match HttpTranscriber::new(
            &config.endpoint,
            config.connect_timeout(),
            config.request_timeout(),
        ) {
            Ok(transcriber) => {
                let constraints = CaptureConstraints {
                    device: config.input_device.clone(),
                    ..CaptureConstraints::default()
                };
                let pipeline = VoicePipeline::new(
                    Box::new(CpalBackend::new()),
                    Arc::new(transcriber),
                    constraints,
                    config.strip_timestamps,
                );
                Composer::new(options).with_voice(pipeline)
            }
            Err(err) => {
                tracing::warn!("voice disabled: {err}");
                Composer::new(options)
            }
        };

        Self {
            config,
            composer,
            last_level_db: None,
            exit_requested: false,
        }
    }

    #[cfg(any(test, feature = "mutants"))]
    pub(super) fn for_tests(config: AppConfig, composer: Composer) -> Self {
        Self {
            config,
            composer,
            last_level_db: None,
            exit_requested: false,
        }
    }

    pub(super) fn emit_capabilities(&self) {
        // Device presence is probed here rather than cached so a capabilities
        // request after plugging in a microphone reflects reality.
        let devices = CpalBackend::input_device_names();
        send_event(&IpcEvent::Capabilities {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mic_available: !devices.is_empty(),
            input_device: self.config.input_device.clone(),
            endpoint: self.config.endpoint.clone(),
            strip_timestamps: self.config.strip_timestamps,
            auto_submit: self.config.auto_submit,
        });
    }
}
