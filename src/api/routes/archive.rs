//! Archive export handler.

use super::DownloadZipQuery;
use crate::api::AppState;
use crate::error::{Error, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};

/// Response header announcing a binary body, kept for older download managers
pub const CONTENT_TRANSFER_ENCODING: HeaderName =
    HeaderName::from_static("content-transfer-encoding");

/// GET /api/downloadzip - Stream every file of a torrent as one ZIP archive
///
/// Preflight failures answer with a bare status code. Once the headers are sent
/// the archive streams as pieces arrive; files that cannot be read are skipped
/// or truncated instead of failing the response.
#[utoipa::path(
    get,
    path = "/api/downloadzip",
    tag = "archive",
    params(DownloadZipQuery),
    responses(
        (status = 200, description = "ZIP archive of the torrent's files", content_type = "application/zip"),
        (status = 400, description = "Missing or invalid hash, or torrent has no files"),
        (status = 401, description = "Missing or wrong basic credentials", body = crate::error::ApiError),
        (status = 404, description = "Torrent not found"),
        (status = 500, description = "Torrent metadata did not resolve")
    ),
    security(("basic_auth" = []))
)]
pub async fn download_zip(
    State(state): State<AppState>,
    Query(query): Query<DownloadZipQuery>,
) -> Result<Response> {
    let reference = query
        .hash
        .as_deref()
        .filter(|hash| !hash.is_empty())
        .ok_or_else(|| {
            tracing::warn!("downloadzip called without hash");
            Error::MissingParameter("hash")
        })?;

    let prepared = state
        .exporter
        .prepare(state.engine.as_ref(), reference)
        .await?;

    let disposition = content_disposition(prepared.archive_name())?;
    let (stream, _task) = prepared.into_stream();

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
            (CONTENT_TRANSFER_ENCODING, HeaderValue::from_static("binary")),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `attachment; filename="<name>"`, keeping non-ASCII names as raw UTF-8
fn content_disposition(archive_name: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(format!("attachment; filename=\"{archive_name}\"").as_bytes())
        .map_err(|e| Error::Other(format!("invalid archive name {archive_name:?}: {e}")))
}
