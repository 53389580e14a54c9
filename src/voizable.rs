//! High-level API for running transcriptions with Voizable.
//!
//! We expose a single, ergonomic entry point (`Voizable`) that wraps the
//! lower-level decoding, Whisper, and SRT-encoding logic.
//!
//! The intent is:
//! - We load the model once (expensive).
//! - We reuse it to transcribe many uploaded files.
//! - The backend is an injected capability, so tests can substitute a fake
//!   model instead of loading whisper.cpp.
//!
//! This module is deliberately “high level”: it wires up decode → model →
//! SRT rendering, while keeping the lower-level pieces testable in their own
//! modules.

use std::path::Path;

use tracing::debug;

use crate::backends::whisper::WhisperBackend;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::segments::{Transcript, TranscriptOutput};
use crate::srt_encoder::format_srt;
use crate::transcriber::Transcriber;

/// The main high-level transcription entry point.
///
/// `Voizable` owns the long-lived backend (loaded model + runtime state).
///
/// Typical usage:
/// - Construct once (model loading happens here).
/// - Call `transcribe_file` once per uploaded file.
///
/// The service keeps no per-request state, so it is safe to share behind an
/// `Arc` and call from concurrently running requests.
pub struct Voizable<B: Transcriber = WhisperBackend> {
    backend: B,
}

impl Voizable<WhisperBackend> {
    /// Create a new `Voizable` instance using the built-in Whisper backend.
    pub fn new(model_path: &str) -> Result<Self> {
        let backend = WhisperBackend::new(model_path)?;
        Ok(Self::with_backend(backend))
    }
}

impl<B: Transcriber> Voizable<B> {
    /// Create a new `Voizable` instance using a custom backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Transcribe the media file at `path` and render the result as plain
    /// text plus SRT captions.
    ///
    /// We fail fast on a missing input file so callers get a clear error
    /// before any model work starts.
    pub fn transcribe_file(&self, path: &Path, opts: &Opts) -> Result<TranscriptOutput> {
        if !path.is_file() {
            return Err(Error::msg(format!(
                "input file not found: '{}'",
                path.display()
            )));
        }

        let transcript = self.transcribe(path, opts)?;
        let srt_content = format_srt(&transcript.segments)?;

        Ok(TranscriptOutput {
            plain_text: transcript.text,
            srt_content,
        })
    }

    /// Transcribe the media file at `path`, returning the raw transcript.
    pub fn transcribe(&self, path: &Path, opts: &Opts) -> Result<Transcript> {
        let transcript = self.backend.transcribe(path, opts)?;
        debug!(
            segments = transcript.segments.len(),
            "transcription complete"
        );
        Ok(transcript)
    }

    /// Access the configured backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
