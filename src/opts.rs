/// Options that control how a transcription is performed.
///
/// This struct represents *library-level configuration*, not CLI or HTTP
/// parameters directly. The binaries are responsible for mapping user input
/// into this type so that:
/// - the library remains reusable outside of a CLI/server context
/// - other frontends (tests, batch jobs) can construct options programmatically
#[derive(Debug, Clone, Default)]
pub struct Opts {
    /// Whether to translate speech to English instead of transcribing verbatim.
    pub enable_translate_to_english: bool,

    /// Optional language hint (e.g. `"en"`, `"es"`).
    ///
    /// When `None`, we allow Whisper to auto-detect the spoken language.
    pub language: Option<String>,
}
