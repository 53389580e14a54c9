use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use voizable::{Opts, Voizable};

#[derive(Parser, Debug)]
#[command(name = "voizable-cli")]
#[command(about = "Transcribe a local audio/video file to SRT captions or plain text")]
struct Params {
    #[arg(short = 'm', long = "model")]
    pub model_path: String,

    /// Path to the audio or video file to transcribe.
    #[arg(short = 'i', long = "input")]
    pub input_path: PathBuf,

    /// Print the plain transcript instead of SRT captions.
    #[arg(long = "plain-text", default_value_t = false)]
    pub plain_text: bool,

    /// Optional language hint (e.g. `en`).
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,

    #[arg(
        short = 't',
        long = "enable-translation-to-english",
        default_value_t = false
    )]
    pub enable_translation_to_english: bool,
}

fn main() -> Result<()> {
    voizable::logging::init();

    let params = Params::parse();

    let service = Voizable::new(&params.model_path)?;
    let opts = Opts {
        enable_translate_to_english: params.enable_translation_to_english,
        language: params.language,
    };

    let output = service.transcribe_file(&params.input_path, &opts)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if params.plain_text {
        writeln!(out, "{}", output.plain_text.trim())?;
    } else {
        out.write_all(output.srt_content.as_bytes())?;
    }

    Ok(())
}
