//! Audio normalization for Whisper input.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono
//! - Resample to Whisper's expected sample rate (when needed)
//! - Accumulate the normalized samples into one contiguous buffer
//!
//! The service transcribes whole uploaded files, so unlike a live pipeline
//! there is no chunked emission here: callers push decoded buffers, call
//! `finalize()` at end-of-stream, and take the full sample buffer.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Whisper's expected mono sample rate (Hz).
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// A small stateful pipeline that converts decoded audio into mono 16 kHz `f32` samples.
pub struct AudioPipeline {
    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf_f32: Option<SampleBuffer<f32>>,

    // Lazily initialized resampler (only needed when the source sample rate != 16 kHz).
    resampler: Option<SincFixedIn<f32>>,

    // Accumulator for mono source samples before feeding full blocks into rubato.
    mono_src_acc: Vec<f32>,

    // Normalized output: mono samples at `WHISPER_SAMPLE_RATE`.
    out: Vec<f32>,
}

/// Creates an empty audio pipeline with no buffered samples or initialized resampler.
impl Default for AudioPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPipeline {
    /// Create a new audio pipeline with empty internal buffers.
    pub fn new() -> Self {
        Self {
            sample_buf_f32: None,
            resampler: None,
            mono_src_acc: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Push a decoded Symphonia buffer through the pipeline.
    pub fn push_decoded(&mut self, decoded: &AudioBufferRef<'_>) -> Result<()> {
        let (interleaved, src_rate, channels) =
            decoded_to_interleaved_f32(decoded, &mut self.sample_buf_f32)?;

        let mono_src = downmix_to_mono(&interleaved, channels);

        // Fast path: already at the target sample rate.
        if src_rate == WHISPER_SAMPLE_RATE {
            self.out.extend_from_slice(&mono_src);
            return Ok(());
        }

        // Slow path: resample to the target sample rate.
        self.ensure_resampler(src_rate)?;
        self.mono_src_acc.extend_from_slice(&mono_src);
        self.drain_full_resampler_blocks()?;
        Ok(())
    }

    /// Flush remaining buffered samples at end-of-stream and return the full
    /// normalized buffer.
    ///
    /// If resampling was never needed, this just hands back what was pushed.
    pub fn finalize(mut self) -> Result<Vec<f32>> {
        let Some(rs) = self.resampler.as_ref() else {
            return Ok(self.out);
        };

        if !self.mono_src_acc.is_empty() {
            // rubato expects exact block sizes; pad the remainder with zeros.
            let in_max = rs.input_frames_max();
            let rem = self.mono_src_acc.len() % in_max;
            if rem != 0 {
                self.mono_src_acc
                    .resize(self.mono_src_acc.len() + (in_max - rem), 0.0);
            }

            self.drain_full_resampler_blocks()?;
        }

        Ok(self.out)
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        // How many source frames we feed rubato per `process()` call.
        // Tradeoff: larger blocks = better throughput; we favor throughput since
        // the whole file is decoded before transcription starts anyway.
        let in_block_src_frames = 2048;

        let rs = SincFixedIn::<f32>::new(
            WHISPER_SAMPLE_RATE as f64 / src_rate as f64,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            in_block_src_frames,
            1, // mono
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.resampler = Some(rs);
        Ok(())
    }

    /// Feed every complete input block through rubato and append the output.
    fn drain_full_resampler_blocks(&mut self) -> Result<()> {
        loop {
            let rs = self
                .resampler
                .as_mut()
                .ok_or_else(|| anyhow!("resampler not initialized"))?;
            let in_max = rs.input_frames_max();

            if self.mono_src_acc.len() < in_max {
                return Ok(());
            }

            let block: Vec<f32> = self.mono_src_acc.drain(..in_max).collect();
            let resampled = rs
                .process(&[block], None)
                .map_err(|e| anyhow!(e))
                .context("resampler process failed")?;

            if resampled.len() != 1 {
                bail!("expected mono output from resampler");
            }

            self.out.extend_from_slice(&resampled[0]);
        }
    }
}

fn decoded_to_interleaved_f32(
    decoded: &AudioBufferRef<'_>,
    sample_buf_f32: &mut Option<SampleBuffer<f32>>,
) -> Result<(Vec<f32>, u32, usize)> {
    ensure_sample_buffer(decoded, sample_buf_f32);

    let buf = sample_buf_f32
        .as_mut()
        .ok_or_else(|| anyhow!("sample buffer not initialized"))?;

    // Copy decoded PCM into our interleaved scratch buffer.
    buf.copy_interleaved_ref(decoded.clone());

    let src_rate = decoded.spec().rate;
    let channels = decoded.spec().channels.count();
    if channels == 0 {
        bail!("decoded audio had zero channels");
    }

    Ok((buf.samples().to_vec(), src_rate, channels))
}

fn ensure_sample_buffer(
    decoded: &AudioBufferRef<'_>,
    sample_buf_f32: &mut Option<SampleBuffer<f32>>,
) {
    if sample_buf_f32.is_some() {
        return;
    }

    let spec = *decoded.spec();
    let duration = decoded.capacity() as u64;
    *sample_buf_f32 = Some(SampleBuffer::<f32>::new(duration, spec));
}

/// Downmix interleaved samples into mono by averaging channels.
///
/// Policy: equal-weight average across channels (simple, predictable).
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);

    for f in 0..frames {
        let base = f * channels;
        let mut acc = 0.0;
        for c in 0..channels {
            acc += interleaved[base + c];
        }
        mono.push(acc / channels as f32);
    }

    mono
}
