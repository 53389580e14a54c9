use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};
use uuid::Uuid;

mod metrics;

use voizable::{Opts, Transcriber, TranscriptOutput, Voizable};

#[derive(Parser, Debug)]
#[command(name = "voizable-server")]
#[command(about = "HTTP server for audio/video transcription with SRT output")]
struct Params {
    /// Path to a whisper.cpp model file (e.g. `ggml-base.bin`).
    #[arg(short = 'm', long = "model", required = true)]
    model_path: String,

    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8080)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 100 * 1024 * 1024)]
    max_bytes: usize,

    /// Directory for transient per-request upload files.
    /// Defaults to a process-owned temporary directory.
    #[arg(long = "uploads-dir")]
    uploads_dir: Option<PathBuf>,

    /// Optional language hint passed to the model (e.g. `en`).
    #[arg(long = "language")]
    language: Option<String>,

    /// Translate speech to English instead of transcribing verbatim.
    #[arg(long = "translate", default_value_t = false)]
    translate_to_english: bool,
}

struct AppState<B: Transcriber> {
    service: Arc<Voizable<B>>,
    uploads_dir: PathBuf,
    opts: Opts,
}

// Manual impl: `#[derive(Clone)]` would require `B: Clone`, which backends
// don't provide.
impl<B: Transcriber> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            uploads_dir: self.uploads_dir.clone(),
            opts: self.opts.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    voizable::logging::init();

    if let Err(err) = run().await {
        error!(error = ?err, "voizable-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    metrics::init();

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    // When no uploads dir is given, we own a scratch dir for the lifetime of
    // the process; it is removed when `run` returns.
    let mut scratch_dir = None;
    let uploads_dir = match params.uploads_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create uploads dir '{}'", dir.display()))?;
            dir
        }
        None => {
            let dir = tempfile::tempdir().context("failed to create uploads scratch dir")?;
            let path = dir.path().to_path_buf();
            scratch_dir = Some(dir);
            path
        }
    };

    let service = Voizable::new(&params.model_path)
        .map_err(|err| anyhow::anyhow!("failed to initialize Whisper backend: {err}"))?;

    let state = AppState {
        service: Arc::new(service),
        uploads_dir,
        opts: Opts {
            enable_translate_to_english: params.translate_to_english,
            language: params.language,
        },
    };

    let app = build_router(state, params.max_bytes);

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    drop(scratch_dir);
    Ok(())
}

fn build_router<B>(state: AppState<B>, max_bytes: usize) -> Router
where
    B: Transcriber + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/transcribe", post(transcribe::<B>))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "voizable transcription service is active",
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn transcribe<B>(
    State(state): State<AppState<B>>,
    mut multipart: Multipart,
) -> std::result::Result<Json<TranscriptOutput>, AppError>
where
    B: Transcriber + Send + Sync + 'static,
{
    let start = Instant::now();

    // Walk the multipart stream until the `file` field, skipping other fields.
    // The field is consumed (streamed to disk) inside the loop so its borrow of
    // the multipart stream never outlives one iteration.
    let mut upload: Option<(PathBuf, std::result::Result<(), AppError>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let path = state.uploads_dir.join(unique_upload_name(field.file_name()));
        let written = write_field_to_file(field, &path).await;
        upload = Some((path, written));
        break;
    }

    let Some((upload_path, written)) = upload else {
        return Err(AppError::bad_request("no file was uploaded"));
    };

    // The model only runs if the upload was fully persisted.
    let result = match written {
        Ok(()) => {
            let service = state.service.clone();
            let opts = state.opts.clone();
            let path = upload_path.clone();
            tokio::task::spawn_blocking(move || service.transcribe_file(&path, &opts))
                .await
                .map_err(|err| AppError::internal(format!("transcription task failed: {err}")))
                .and_then(|res| {
                    res.map_err(|err| {
                        AppError::internal(format!("error during transcription process: {err}"))
                    })
                })
        }
        Err(err) => Err(err),
    };

    // Cleanup is unconditional, success or failure.
    if let Err(err) = tokio::fs::remove_file(&upload_path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %upload_path.display(), error = %err, "failed to remove upload file");
        }
    }

    metrics::observe_transcribe_duration(start.elapsed().as_secs_f64());

    result.map(Json)
}

/// Build a per-request upload filename: `"<uuid4>_<sanitized client name>"`.
///
/// The client-supplied name is reduced to its final path component so it can
/// never escape the uploads directory.
fn unique_upload_name(client_name: Option<&str>) -> String {
    let safe_name = client_name
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    format!("{}_{safe_name}", Uuid::new_v4())
}

/// Stream the multipart field to disk chunk by chunk.
///
/// Writing in chunks keeps memory bounded and guarantees the file is fully
/// flushed before the model reads it.
async fn write_field_to_file(
    mut field: Field<'_>,
    path: &Path,
) -> std::result::Result<(), AppError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|err| AppError::internal(format!("failed to create upload file: {err}")))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| AppError::bad_request(format!("failed reading upload: {err}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|err| AppError::internal(format!("failed writing upload: {err}")))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|err| AppError::internal(format!("failed flushing upload: {err}")))?;

    if written == 0 {
        return Err(AppError::bad_request("uploaded file was empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use std::path::PathBuf;
    use tower::ServiceExt;
    use voizable::{Segment, Transcript};

    struct FakeTranscriber {
        fail: bool,
        transcript: Transcript,
    }

    impl FakeTranscriber {
        fn with_segments(segments: Vec<Segment>) -> Self {
            let text: String = segments.iter().map(|s| s.text.as_str()).collect();
            Self {
                fail: false,
                transcript: Transcript { text, segments },
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                transcript: Transcript {
                    text: String::new(),
                    segments: Vec::new(),
                },
            }
        }
    }

    impl Transcriber for FakeTranscriber {
        fn transcribe(&self, path: &Path, _opts: &Opts) -> anyhow::Result<Transcript> {
            anyhow::ensure!(path.is_file(), "upload file missing at model invocation");
            if self.fail {
                anyhow::bail!("model exploded");
            }
            Ok(self.transcript.clone())
        }
    }

    fn test_router(backend: FakeTranscriber) -> (Router, PathBuf, tempfile::TempDir) {
        let uploads = tempfile::tempdir().expect("tempdir");
        let uploads_dir = uploads.path().to_path_buf();
        let state = AppState {
            service: Arc::new(Voizable::with_backend(backend)),
            uploads_dir: uploads_dir.clone(),
            opts: Opts::default(),
        };
        (build_router(state, 1024 * 1024), uploads_dir, uploads)
    }

    fn multipart_request(field_name: &str, filename: &str, data: &str) -> Request<Body> {
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {data}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/transcribe")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let (app, _dir, _guard) = test_router(FakeTranscriber::with_segments(Vec::new()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "OK");
    }

    #[tokio::test]
    async fn transcribe_returns_plain_text_and_srt() {
        let segments = vec![
            Segment {
                start_seconds: 0.0,
                end_seconds: 2.5,
                text: " Hello world".to_string(),
            },
            Segment {
                start_seconds: 2.5,
                end_seconds: 5.0,
                text: " Next segment".to_string(),
            },
        ];
        let (app, uploads_dir, _guard) = test_router(FakeTranscriber::with_segments(segments));

        let response = app
            .oneshot(multipart_request("file", "clip.wav", "fake-audio-bytes"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["plain_text"], " Hello world Next segment");
        assert_eq!(
            json["srt_content"],
            "1\n00:00:00,000 --> 00:00:02,500\nHello world\n\n\
             2\n00:00:02,500 --> 00:00:05,000\nNext segment\n\n"
        );

        // Temp file cleanup is unconditional.
        assert_eq!(std::fs::read_dir(&uploads_dir).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn transcribe_silent_clip_yields_zero_cues() {
        let (app, _dir, _guard) = test_router(FakeTranscriber::with_segments(Vec::new()));

        let response = app
            .oneshot(multipart_request("file", "silence.wav", "fake-audio-bytes"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["plain_text"], "");
        assert_eq!(json["srt_content"], "");
    }

    #[tokio::test]
    async fn transcribe_without_file_field_is_bad_request() {
        let (app, _dir, _guard) = test_router(FakeTranscriber::with_segments(Vec::new()));

        let response = app
            .oneshot(multipart_request("other", "clip.wav", "data"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "no file was uploaded");
    }

    #[tokio::test]
    async fn transcribe_backend_failure_is_internal_error_and_cleans_up() {
        let (app, uploads_dir, _guard) = test_router(FakeTranscriber::failing());

        let response = app
            .oneshot(multipart_request("file", "clip.wav", "fake-audio-bytes"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        let detail = json["error"].as_str().expect("error string");
        assert!(detail.contains("model exploded"));

        assert_eq!(std::fs::read_dir(&uploads_dir).expect("read dir").count(), 0);
    }

    #[test]
    fn unique_upload_name_strips_path_components() {
        let name = unique_upload_name(Some("../../etc/passwd"));
        assert!(name.ends_with("_passwd"));
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn unique_upload_name_falls_back_without_filename() {
        let name = unique_upload_name(None);
        assert!(name.ends_with("_upload"));
    }

    #[test]
    fn unique_upload_names_are_unique() {
        let a = unique_upload_name(Some("clip.wav"));
        let b = unique_upload_name(Some("clip.wav"));
        assert_ne!(a, b);
    }
}
