//! Clip upload and analysis handler.
//!
//! The upload is streamed into a request-owned temporary file, analyzed on
//! the blocking pool and deleted when the handle drops, whatever the outcome.

use std::io;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use actsense_models::ClassificationResult;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the clip.
pub const VIDEO_FIELD: &str = "video";

/// Accepted container extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// Lowercased extension of `filename` if it is an accepted container.
pub fn video_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// A clip stored on disk for the duration of one request.
struct Upload {
    file: NamedTempFile,
    filename: String,
    bytes: u64,
}

/// Async writer over the file backing an upload.
struct UploadWriter {
    inner: BufWriter<tokio::fs::File>,
    bytes: u64,
}

impl UploadWriter {
    fn new(file: &NamedTempFile) -> io::Result<Self> {
        let handle = file.as_file().try_clone()?;
        Ok(Self {
            inner: BufWriter::new(tokio::fs::File::from_std(handle)),
            bytes: 0,
        })
    }

    async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.write_all(chunk).await?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    /// Flush everything to disk and return the byte count.
    async fn finish(mut self) -> io::Result<u64> {
        self.inner.flush().await?;
        Ok(self.bytes)
    }
}

async fn receive_video(multipart: &mut Multipart) -> ApiResult<Upload> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            metrics::record_upload_rejected("no_filename");
            return Err(ApiError::bad_request("No video file selected"));
        }
        let Some(ext) = video_extension(&filename) else {
            metrics::record_upload_rejected("bad_extension");
            return Err(ApiError::bad_request(
                "Invalid video format. Please upload MP4, AVI, MOV, MKV, or WebM",
            ));
        };

        // Decoders sniff the container from the extension.
        let file = tempfile::Builder::new()
            .prefix("actsense-")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .map_err(|e| ApiError::internal(format!("Failed to create temp file: {e}")))?;

        let save_error = |e: io::Error| ApiError::internal(format!("Failed to save video: {e}"));
        let mut writer = UploadWriter::new(&file).map_err(save_error)?;
        while let Some(chunk) = field.chunk().await? {
            writer.write(&chunk).await.map_err(save_error)?;
        }
        let bytes = writer.finish().await.map_err(save_error)?;

        if bytes == 0 {
            metrics::record_upload_rejected("empty");
            return Err(ApiError::bad_request("Uploaded video is empty"));
        }

        debug!(filename = %filename, bytes, path = %file.path().display(), "Upload stored");
        return Ok(Upload {
            file,
            filename,
            bytes,
        });
    }

    metrics::record_upload_rejected("missing_field");
    Err(ApiError::bad_request("No video uploaded"))
}

/// Analyze an uploaded clip (`POST /analyze`, `POST /detect_motion`).
pub async fn analyze_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClassificationResult>> {
    let upload = receive_video(&mut multipart).await?;
    metrics::record_upload_bytes(upload.bytes);
    info!(filename = %upload.filename, bytes = upload.bytes, "Video received");

    let analyzer = Arc::clone(&state.analyzer);
    let result = tokio::task::spawn_blocking(move || {
        let outcome = analyzer.analyze_file(upload.file.path());
        drop(upload);
        outcome
    })
    .await
    .map_err(|e| ApiError::internal(format!("Analysis task failed: {e}")))??;

    Ok(Json(result))
}
