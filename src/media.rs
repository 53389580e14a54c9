//! Demux and decode helpers built on top of Symphonia.
//!
//! Uploads are persisted to disk before transcription, so this module works
//! with seekable files rather than live streams:
//! - probe a media file and select a reasonable default audio track
//! - iterate packets, treating IO errors as end-of-stream
//! - decode packets, skipping corrupt frames
//! - feed everything through `audio::AudioPipeline` into one sample buffer
//!
//! Container/codec edge cases stay isolated here so the backends can focus on
//! running the model.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, Track};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::AudioPipeline;

/// Decode a media file (audio or video container) into mono `f32` samples at
/// Whisper's expected sample rate.
pub fn decode_file_to_samples(path: &Path) -> Result<Vec<f32>> {
    let (mut format, track) = probe_file_and_pick_default_track(path)?;
    let mut decoder = make_decoder_for_track(&track)?;
    let mut pipeline = AudioPipeline::new();

    loop {
        let Some(packet) = next_packet(&mut format)? else {
            break;
        };

        // Ignore packets from non-audio tracks (video uploads carry both).
        if packet.track_id() != track.id {
            continue;
        }

        decode_packet_and_then(&mut decoder, &packet, |decoded| {
            pipeline
                .push_decoded(&decoded)
                .context("audio pipeline failed while processing decoded samples")
        })?;
    }

    pipeline
        .finalize()
        .context("audio pipeline failed during finalize")
}

/// Probe the container and pick a default audio track.
///
/// Track selection policy:
/// - choose the first track that looks decodable (codec != NULL)
/// - and has a known sample rate (required for resampling decisions downstream)
///
/// The file extension is passed as a probe hint, which helps with ambiguous
/// containers.
pub fn probe_file_and_pick_default_track(
    path: &Path,
) -> Result<(Box<dyn FormatReader>, Track)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))?;

    let mss_opts = MediaSourceStreamOptions {
        // Symphonia expects a power-of-two buffer > 32KiB for good probing behavior.
        buffer_len: 256 * 1024,
    };

    let mss = MediaSourceStream::new(Box::new(file), mss_opts);

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to probe media file")?;

    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or_else(|| anyhow!("no audio track found"))?;

    Ok((format, track))
}

/// Create a decoder for the given audio track using Symphonia's default codec
/// registry.
fn make_decoder_for_track(track: &Track) -> Result<Box<dyn Decoder>> {
    let decoder_opts: DecoderOptions = Default::default();

    symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")
}

/// Read the next packet, treating IO errors as "end of stream".
///
/// - `Ok(None)` means EOF or stream ended
/// - other errors are surfaced with context
fn next_packet(format: &mut Box<dyn FormatReader>) -> Result<Option<Packet>> {
    match format.next_packet() {
        Ok(p) => Ok(Some(p)),
        Err(SymphoniaError::IoError(_)) => Ok(None),
        Err(e) => Err(anyhow!(e)).context("failed reading packet"),
    }
}

/// Decode a packet and immediately hand the decoded buffer to a callback.
///
/// Return value semantics:
/// - `Ok(true)`  → a decoded audio buffer was produced and `on_decoded` ran
/// - `Ok(false)` → packet was skipped or stream ended (recoverable condition)
/// - `Err(_)`    → fatal decoder error
///
/// Error handling policy:
/// - `DecodeError` → skip bad frame (common with some codecs)
/// - `IoError`     → treat as end-of-stream
/// - other errors  → bubble up with context
fn decode_packet_and_then(
    decoder: &mut Box<dyn Decoder>,
    packet: &Packet,
    mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
) -> Result<bool> {
    match decoder.decode(packet) {
        Ok(buf) => {
            on_decoded(buf)?;
            Ok(true)
        }

        // Recoverable: corrupted frame, but decoding can continue.
        Err(SymphoniaError::DecodeError(_)) => Ok(false),

        // Treat IO errors as graceful end-of-stream.
        Err(SymphoniaError::IoError(_)) => Ok(false),

        // Anything else is considered fatal.
        Err(e) => Err(anyhow!(e)).context("decoder failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for s in samples {
            writer.write_sample(*s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn decodes_silent_wav_at_target_rate() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("silence.wav");
        write_wav(&path, 16_000, &vec![0i16; 16_000]);

        let samples = decode_file_to_samples(&path)?;
        assert_eq!(samples.len(), 16_000);
        assert!(samples.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn decodes_and_resamples_non_target_rate() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("silence8k.wav");
        write_wav(&path, 8_000, &vec![0i16; 8_000]);

        let samples = decode_file_to_samples(&path)?;
        // One second of 8 kHz audio should resample to roughly one second at
        // 16 kHz; the resampler pads its final block, so allow slack upward.
        assert!(samples.len() >= 15_000, "got {} samples", samples.len());
        Ok(())
    }

    #[test]
    fn probing_garbage_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("not-media.bin");
        std::fs::File::create(&path)?.write_all(&[0u8; 64])?;

        assert!(decode_file_to_samples(&path).is_err());
        Ok(())
    }

    #[test]
    fn missing_file_errors_with_path_context() {
        let err = decode_file_to_samples(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(err.to_string().contains("clip.mp4"));
    }
}
