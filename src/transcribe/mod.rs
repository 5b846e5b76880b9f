//! Remote transcription: the endpoint contract, the local cleanup pass, and
//! the client seam the pipeline talks to.

pub mod cleanup;
pub mod client;

pub use client::{HttpTranscriber, Transcribe, Transcript};
