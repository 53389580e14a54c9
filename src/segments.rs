use serde::{Deserialize, Serialize};

/// A single timed span of recognized speech.
///
/// Timestamps are seconds from the start of the input. The model produces
/// segments with `0 <= start_seconds <= end_seconds`; we do not re-validate
/// that invariant downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// The output contract of a transcription backend: the full transcript text
/// plus its ordered timestamped segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// The full transcript as a single string.
    pub text: String,

    /// Timed segments in input order.
    pub segments: Vec<Segment>,
}

/// The per-request response payload: the plain transcript plus its SRT
/// rendering. Derived transiently; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptOutput {
    pub plain_text: String,
    pub srt_content: String,
}
