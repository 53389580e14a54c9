//! `voizable` — a small transcription service library built on top of Whisper.
//!
//! This crate provides:
//! - Model loading and context management
//! - Media decoding into Whisper's expected sample format
//! - Segment extraction
//! - SRT caption rendering
//!
//! The library is designed to back both a CLI tool and a long-running HTTP
//! service: load the model once, transcribe many uploaded files, and render
//! each result as plain text plus SRT captions.

// High-level API (most consumers should start here).
pub mod opts;
pub mod voizable;

// Segment data structures and the transcription model contract.
pub mod segments;
pub mod transcriber;

// Media decoding into mono 16 kHz samples.
pub mod audio;
pub mod media;

// Encoder interface and the SRT renderer.
pub mod segment_encoder;
pub mod srt_encoder;

// Concrete model backends.
pub mod backends;

// Crate-wide error type.
pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use crate::backends::whisper::WhisperBackend;
pub use crate::error::{Error, Result};
pub use crate::opts::Opts;
pub use crate::segments::{Segment, Transcript, TranscriptOutput};
pub use crate::transcriber::Transcriber;
pub use crate::voizable::Voizable;
