//! Transcription endpoint client: one multipart upload in, normalized text
//! out, no state carried between calls.

use std::time::Duration;

use serde::Deserialize;

use crate::audio::AudioBlob;
use crate::error::{Error, Result};
use crate::transcribe::cleanup::strip_timestamps;

/// Text returned by one transcription call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Text as returned by the service, trimmed.
    pub raw: String,
    /// `raw` with timestamp markers removed when stripping was requested;
    /// always a strict reduction of `raw`.
    pub cleaned: String,
}

impl Transcript {
    /// The text to merge into the composed message.
    pub fn text(&self) -> &str {
        &self.cleaned
    }
}

/// Transcription seam. The HTTP client implements it for production; tests
/// script it. Implementations are stateless per call; retry accounting is
/// the caller's job.
pub trait Transcribe: Send + Sync {
    fn transcribe(&self, blob: &AudioBlob, strip_timestamps: bool) -> Result<Transcript>;
}

/// Wire shape of the endpoint's JSON response.
#[derive(Debug, Deserialize)]
struct EndpointResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    text: Option<String>,
}

/// Blocking HTTP client for the transcription endpoint.
///
/// Runs on the pipeline's job worker thread, never on the event loop.
pub struct HttpTranscriber {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpTranscriber {
    /// Build a client with explicit connect and overall deadlines so an
    /// unreachable endpoint fails fast instead of hanging a job forever.
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| Error::transcription(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transcribe for HttpTranscriber {
    fn transcribe(&self, blob: &AudioBlob, strip: bool) -> Result<Transcript> {
        use reqwest::blocking::multipart::{Form, Part};

        let part = Part::bytes(blob.bytes.clone())
            .file_name(blob.upload_name())
            .mime_str(blob.format.mime())
            .map_err(|err| Error::transcription(format!("invalid upload MIME type: {err}")))?;
        let form = Form::new().part("audio", part);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if strip {
            request = request.query(&[("removeTimestamps", "true")]);
        }

        let response = request
            .send()
            .map_err(|err| Error::transcription(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::transcription(format!(
                "endpoint returned HTTP {status}"
            )));
        }
        let body = response
            .text()
            .map_err(|err| Error::transcription(format!("failed to read response: {err}")))?;
        parse_success_body(&body, strip)
    }
}

/// Apply the response contract to a 2xx body: `success: true` plus a
/// non-empty text field, with the local cleanup pass layered on when
/// stripping was requested (defense in depth against servers that ignore the
/// query flag).
fn parse_success_body(body: &str, strip: bool) -> Result<Transcript> {
    let response: EndpointResponse = serde_json::from_str(body)
        .map_err(|err| Error::transcription(format!("unreadable response: {err}")))?;
    if !response.success {
        return Err(Error::transcription("endpoint reported failure"));
    }
    let raw = response.text.unwrap_or_default().trim().to_string();
    if raw.is_empty() {
        return Err(Error::transcription("endpoint returned no text"));
    }
    let cleaned = if strip {
        strip_timestamps(&raw)
    } else {
        raw.clone()
    };
    Ok(Transcript { raw, cleaned })
}
