//! Microphone capture seam so the session can drive a real device in
//! production and a scripted one under test.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::format::AudioFormat;
use crate::audio::level::{LevelMeter, SharedLevel};
use crate::audio::SAMPLE_RATE;
use crate::error::{Error, Result};

/// Recover a poisoned chunk-buffer lock instead of wedging the capture; a
/// panicking stream callback must not take the whole session with it.
fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> std::sync::MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::debug!("mutex poisoned in {context}; recovering");
            poisoned.into_inner()
        }
    }
}

/// Acquisition hints passed to the platform when opening the microphone.
///
/// Echo cancellation and noise suppression are best-effort: honored where the
/// platform capture stack applies them, ignored otherwise.
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Preferred input device name; `None` selects the system default.
    pub device: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            echo_cancellation: true,
            noise_suppression: true,
            device: None,
        }
    }
}

/// Platform microphone facility.
///
/// `supports`/`native_format` drive container negotiation; `open` acquires the
/// device and starts delivering chunks until the returned capture is finished
/// or aborted.
pub trait CaptureBackend {
    fn supports(&self, format: AudioFormat) -> bool;
    fn native_format(&self) -> AudioFormat;
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        format: AudioFormat,
    ) -> Result<Box<dyn ActiveCapture>>;
}

/// A live recording stream.
///
/// Both `finish` and `abort` consume the capture; either way the underlying
/// device stream must be released before the call returns.
pub trait ActiveCapture {
    /// Latest input level in dBFS, when a reading exists.
    fn level_db(&self) -> Option<f32>;

    /// Stop the stream, release the device, then assemble the accumulated
    /// chunks into one encoded blob. The device is released even when
    /// encoding fails.
    fn finish(self: Box<Self>) -> anyhow::Result<Vec<u8>>;

    /// Release the device without producing a blob.
    fn abort(self: Box<Self>);
}

// ============================================================================
// cpal backend
// ============================================================================

/// Capture backend over the host's default audio stack.
///
/// cpal delivers raw PCM, so this backend advertises no opus container
/// support; negotiation falls back to its native WAV format.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Names of the available input devices, for diagnostics and selection.
    /// Enumeration failures (headless hosts included) read as "no devices".
    pub fn input_device_names() -> Vec<String> {
        let Ok(host) = std::panic::catch_unwind(cpal::default_host) else {
            tracing::warn!("audio host initialization panicked; reporting no devices");
            return Vec::new();
        };
        match host.input_devices() {
            Ok(devices) => devices.filter_map(|device| device.name().ok()).collect(),
            Err(err) => {
                tracing::warn!("failed to enumerate input devices: {err}");
                Vec::new()
            }
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn supports(&self, _format: AudioFormat) -> bool {
        false
    }

    fn native_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        format: AudioFormat,
    ) -> Result<Box<dyn ActiveCapture>> {
        debug_assert_eq!(format, AudioFormat::Wav);
        let host = cpal::default_host();
        let device = match &constraints.device {
            Some(name) => find_input_device(&host, name)?,
            None => host
                .default_input_device()
                .ok_or_else(|| Error::device("no input device found"))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown device".into());

        let config = stream_config_for(&device, constraints.sample_rate)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        if !constraints.echo_cancellation || !constraints.noise_suppression {
            tracing::debug!("capture hints disabled by caller; platform defaults apply");
        }

        let chunks: Arc<Mutex<Vec<Vec<i16>>>> = Arc::new(Mutex::new(Vec::new()));
        let level = SharedLevel::new();

        let callback_chunks = Arc::clone(&chunks);
        let callback_level = level.clone();
        let mut meter = LevelMeter::new(sample_rate);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut chunk = Vec::with_capacity(data.len());
                    for &sample in data {
                        chunk.push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                        if let Some(db) = meter.push(sample) {
                            callback_level.set(db);
                        }
                    }
                    lock_or_recover(&callback_chunks, "capture chunk buffer").push(chunk);
                },
                move |err| {
                    tracing::warn!("input stream error: {err}");
                },
                None,
            )
            .map_err(|err| Error::device(format!("failed to open input stream: {err}")))?;
        stream
            .play()
            .map_err(|err| Error::device(format!("failed to start input stream: {err}")))?;

        tracing::debug!("recording from '{device_name}' at {sample_rate} Hz, {channels} ch");
        Ok(Box::new(CpalCapture {
            stream: Some(stream),
            chunks,
            level,
            sample_rate,
            channels,
        }))
    }
}

fn find_input_device(host: &cpal::Host, name: &str) -> Result<cpal::Device> {
    let devices = host
        .input_devices()
        .map_err(|err| Error::device(format!("failed to enumerate input devices: {err}")))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(Error::device(format!("input device '{name}' not found")))
}

/// Pick the supported f32 config closest to the target rate, falling back to
/// the device default when no f32 range is advertised.
fn stream_config_for(device: &cpal::Device, target_rate: u32) -> Result<cpal::StreamConfig> {
    let ranges = device
        .supported_input_configs()
        .map_err(|err| Error::device(format!("failed to query input configs: {err}")))?;

    let mut best: Option<cpal::SupportedStreamConfig> = None;
    let mut best_diff = u32::MAX;
    for range in ranges {
        if range.sample_format() != cpal::SampleFormat::F32 {
            continue;
        }
        let rate = target_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        let diff = rate.abs_diff(target_rate);
        if diff < best_diff {
            best_diff = diff;
            best = Some(range.with_sample_rate(cpal::SampleRate(rate)));
        }
    }

    let supported = match best {
        Some(config) => config,
        None => device
            .default_input_config()
            .map_err(|err| Error::device(format!("no usable input config: {err}")))?,
    };
    Ok(supported.config())
}

struct CpalCapture {
    stream: Option<cpal::Stream>,
    chunks: Arc<Mutex<Vec<Vec<i16>>>>,
    level: SharedLevel,
    sample_rate: u32,
    channels: u16,
}

impl ActiveCapture for CpalCapture {
    fn level_db(&self) -> Option<f32> {
        self.level.get()
    }

    fn finish(mut self: Box<Self>) -> anyhow::Result<Vec<u8>> {
        // Hard invariant: the device is released before anything else runs,
        // even if encoding below fails.
        drop(self.stream.take());
        let chunks = std::mem::take(&mut *lock_or_recover(&self.chunks, "capture finalize"));
        encode_wav(&chunks, self.channels, self.sample_rate)
    }

    fn abort(self: Box<Self>) {
        drop(self);
    }
}

/// Assemble PCM chunks into a single in-memory WAV blob.
fn encode_wav(chunks: &[Vec<i16>], channels: u16, sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut bytes);
        let mut writer = hound::WavWriter::new(cursor, spec)?;
        for chunk in chunks {
            for &sample in chunk {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

// ============================================================================
// Scripted backend (tests)
// ============================================================================

#[cfg(any(test, feature = "mutants"))]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Deterministic capture backend for exercising the session and pipeline
    /// without hardware.
    pub(crate) struct ScriptedBackend {
        pub supported: Vec<AudioFormat>,
        pub native: AudioFormat,
        pub chunks: Vec<Vec<u8>>,
        pub fail_open: Option<String>,
        pub fail_finish: bool,
        /// Set once the scripted stream has been released.
        pub released: Arc<AtomicBool>,
    }

    impl Default for ScriptedBackend {
        fn default() -> Self {
            Self {
                supported: Vec::new(),
                native: AudioFormat::Wav,
                chunks: vec![b"chunk-a".to_vec(), b"chunk-b".to_vec()],
                fail_open: None,
                fail_finish: false,
                released: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn supports(&self, format: AudioFormat) -> bool {
            self.supported.contains(&format)
        }

        fn native_format(&self) -> AudioFormat {
            self.native
        }

        fn open(
            &mut self,
            _constraints: &CaptureConstraints,
            _format: AudioFormat,
        ) -> Result<Box<dyn ActiveCapture>> {
            if let Some(reason) = &self.fail_open {
                return Err(Error::device(reason.clone()));
            }
            self.released.store(false, Ordering::SeqCst);
            Ok(Box::new(ScriptedCapture {
                chunks: self.chunks.clone(),
                fail_finish: self.fail_finish,
                released: Arc::clone(&self.released),
            }))
        }
    }

    pub(crate) struct ScriptedCapture {
        chunks: Vec<Vec<u8>>,
        fail_finish: bool,
        released: Arc<AtomicBool>,
    }

    impl ActiveCapture for ScriptedCapture {
        fn level_db(&self) -> Option<f32> {
            Some(-18.0)
        }

        fn finish(self: Box<Self>) -> anyhow::Result<Vec<u8>> {
            // Release first, mirroring the real capture contract.
            self.released.store(true, Ordering::SeqCst);
            if self.fail_finish {
                anyhow::bail!("scripted finalize failure");
            }
            Ok(self.chunks.concat())
        }

        fn abort(self: Box<Self>) {
            self.released.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wav_produces_header_even_for_zero_chunks() {
        let bytes = encode_wav(&[], 1, 16_000).expect("encode empty");
        // RIFF header plus fmt/data chunks, no samples.
        assert!(bytes.len() >= 44);
        assert_eq!(&bytes[..4], b"RIFF");
    }

    #[test]
    fn encode_wav_appends_all_chunks_in_order() {
        let chunks = vec![vec![1i16, 2, 3], vec![4, 5]];
        let bytes = encode_wav(&chunks, 1, 16_000).expect("encode");
        let with_one_less = encode_wav(&[vec![1i16, 2, 3]], 1, 16_000).expect("encode");
        assert_eq!(bytes.len() - with_one_less.len(), 2 * 2);
    }
}
