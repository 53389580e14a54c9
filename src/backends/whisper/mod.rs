use std::path::Path;

use anyhow::{Result, ensure};
use whisper_rs::WhisperContext;

use crate::media::decode_file_to_samples;
use crate::opts::Opts;
use crate::segments::Transcript;
use crate::transcriber::Transcriber;

mod ctx;
mod logging;
mod segments;

use segments::collect_segments;

/// Built-in backend powered by `whisper-rs` / `whisper.cpp`.
///
/// The model is loaded once at construction and reused for every call; each
/// `transcribe` creates its own whisper state, so the backend is safe to
/// share across concurrent requests.
pub struct WhisperBackend {
    ctx: WhisperContext,
}

impl WhisperBackend {
    /// Load a whisper.cpp model from disk and initialize a backend.
    pub fn new(model_path: &str) -> Result<Self> {
        ensure!(!model_path.trim().is_empty(), "model path must be provided");

        let model = Path::new(model_path);
        ensure!(model.exists(), "model not found at '{model_path}'");
        ensure!(model.is_file(), "model path is not a file: '{model_path}'");

        let ctx = ctx::get_context(model_path)?;

        Ok(Self { ctx })
    }

    /// Access the underlying Whisper context.
    ///
    /// This is primarily intended for advanced or experimental use-cases.
    pub fn context(&self) -> &WhisperContext {
        &self.ctx
    }
}

impl Transcriber for WhisperBackend {
    fn transcribe(&self, path: &Path, opts: &Opts) -> Result<Transcript> {
        let samples = decode_file_to_samples(path)?;
        if samples.is_empty() {
            return Ok(Transcript {
                text: String::new(),
                segments: Vec::new(),
            });
        }

        let segments = collect_segments(&self.ctx, opts, &samples)?;

        // Whisper's full transcript is the concatenation of its segment texts.
        let text: String = segments.iter().map(|s| s.text.as_str()).collect();

        Ok(Transcript { text, segments })
    }
}
