//! Container/codec negotiation so uploads always carry a format the active
//! backend can actually produce.

/// Audio container/codec combinations this pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Opus in a WebM container (preferred).
    WebmOpus,
    /// Opus in an Ogg container.
    OggOpus,
    /// Plain WebM, codec unspecified.
    Webm,
    /// PCM WAV, the native-capture fallback.
    Wav,
}

impl AudioFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::WebmOpus => "audio/webm;codecs=opus",
            AudioFormat::OggOpus => "audio/ogg;codecs=opus",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Wav => "audio/wav",
        }
    }

    /// File extension used for the upload filename.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::WebmOpus | AudioFormat::Webm => "webm",
            AudioFormat::OggOpus => "ogg",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Ordered preference list for negotiation.
pub const PREFERRED_FORMATS: [AudioFormat; 3] = [
    AudioFormat::WebmOpus,
    AudioFormat::OggOpus,
    AudioFormat::Webm,
];

/// Pick the first preferred format the backend supports, falling back to the
/// backend's native format. Negotiation itself can never fail a recording.
pub fn negotiate(supports: impl Fn(AudioFormat) -> bool, native: AudioFormat) -> AudioFormat {
    PREFERRED_FORMATS
        .into_iter()
        .find(|format| supports(*format))
        .unwrap_or(native)
}

/// Upload extension for an arbitrary MIME string. Ambiguous types default to
/// `webm`, matching the upload contract.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("wav") {
        "wav"
    } else {
        "webm"
    }
}
