use std::path::Path;

use anyhow::Result;

use crate::opts::Opts;
use crate::segments::Transcript;

/// Pluggable speech-to-text backend used by [`crate::Voizable`].
///
/// A backend is an explicitly constructed capability: given the path to a
/// media file on disk, it returns the full transcript text plus ordered,
/// timestamped segments. Passing it into the service (rather than reaching
/// for a process-wide global) is what lets tests substitute a fake model.
///
/// Implementations are expected to be safe to call concurrently from
/// multiple requests (`&self`), with each call independent of the others.
pub trait Transcriber {
    /// Transcribe the media file at `path`.
    ///
    /// This is synchronous and blocking; callers in async contexts should
    /// wrap it in their runtime's blocking facility.
    fn transcribe(&self, path: &Path, opts: &Opts) -> Result<Transcript>;
}
