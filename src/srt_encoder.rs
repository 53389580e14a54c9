use anyhow::Result;
use std::io::Write;

use crate::segment_encoder::SegmentEncoder;
use crate::segments::Segment;

/// A `SegmentEncoder` that writes segments in SubRip (SRT) format.
///
/// Design:
/// - We stream output directly to a `Write` implementation.
/// - Cue indices are assigned by this encoder, 1-based and sequential,
///   independent of any numbering present in the input.
/// - No header is written, so "no segments" runs produce no output at all
///   (close just flushes).
pub struct SrtEncoder<W: Write> {
    /// The underlying writer we stream SRT into.
    w: W,

    /// Index the next cue will be written with. Starts at 1.
    next_index: u64,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> SrtEncoder<W> {
    /// Create a new SRT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            next_index: 1,
            closed: false,
        }
    }
}

impl<W: Write> SegmentEncoder for SrtEncoder<W> {
    /// Write a single cue block: index, timing line, trimmed text, blank line.
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write segment: encoder is already closed");
        }

        // SRT timestamps use `HH:MM:SS,mmm`.
        let start = format_timestamp_srt(seg.start_seconds);
        let end = format_timestamp_srt(seg.end_seconds);

        writeln!(&mut self.w, "{}", self.next_index)?;
        self.next_index += 1;

        // Cue timing line.
        writeln!(&mut self.w, "{start} --> {end}")?;

        // Cue text, with leading/trailing whitespace removed.
        writeln!(&mut self.w, "{}", seg.text.trim())?;

        // Blank line terminates the cue block.
        writeln!(&mut self.w)?;

        // Flush so streaming consumers (stdout, pipes, sockets) see output promptly.
        self.w.flush()?;

        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Render an ordered sequence of segments as one SRT string.
///
/// An empty input yields an empty string.
pub fn format_srt(segments: &[Segment]) -> Result<String> {
    let mut out = Vec::new();
    let mut enc = SrtEncoder::new(&mut out);
    for seg in segments {
        enc.write_segment(seg)?;
    }
    enc.close()?;
    Ok(String::from_utf8(out)?)
}

/// Format seconds into an SRT timestamp (`HH:MM:SS,mmm`).
///
/// Truncation policy:
/// - Every component is floored, milliseconds included. A time of `X.9995`
///   renders as `,999`, never `,000` of the next second. Consumers depend on
///   this being stable, so it must not be changed to rounding.
/// - Hours are zero-padded to 2 digits but never wrap; 100+ hours print with
///   more digits.
pub fn format_timestamp_srt(seconds: f64) -> String {
    let hours = (seconds / 3600.0).floor();
    let rem = seconds - hours * 3600.0;

    let minutes = (rem / 60.0).floor();
    let secs = rem - minutes * 60.0;

    let whole_secs = secs.floor();
    let millis = ((secs - whole_secs) * 1000.0).floor();

    format!(
        "{:02}:{:02}:{:02},{:03}",
        hours as u64, minutes as u64, whole_secs as u64, millis as u64
    )
}
