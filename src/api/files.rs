/// File upload, download and details endpoints
use crate::{
    auth::CallerIdentity,
    blob_store::ByteRange,
    context::AppContext,
    error::{VaultError, VaultResult},
    files::UploadResult,
    metadata::FileDetails,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

/// Build file routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/files", post(upload_files))
        .route("/files/:id", get(download_file))
        .route("/files/:id/details", get(file_details))
}

/// Upload one or more files in a multipart/form-data body
///
/// The body is streamed section by section; the response carries one result
/// per file section, in order, even when some of them failed.
async fn upload_files(
    State(ctx): State<AppContext>,
    caller: CallerIdentity,
    headers: HeaderMap,
    body: Body,
) -> VaultResult<Json<Vec<UploadResult>>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/")
    {
        return Err(VaultError::MalformedRequest(
            "Not a multipart request".to_string(),
        ));
    }

    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| VaultError::MalformedRequest("Boundary can't be empty".to_string()))?;

    let results = ctx
        .coordinator
        .upload_batch(&boundary, body.into_data_stream(), caller.owner())
        .await?;

    let failed = results.iter().filter(|r| r.is_error).count();
    tracing::info!(
        files = results.len(),
        failed,
        owner = ?caller.owner(),
        "Upload request completed"
    );

    Ok(Json(results))
}

/// Stream a stored file back to its owner
///
/// Supports a single `Range: bytes=...` window.
async fn download_file(
    State(ctx): State<AppContext>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> VaultResult<Response> {
    let id = parse_file_id(&id)?;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    let download = ctx.gate.download(id, caller.owner(), range).await?;
    let reader = download.reader;

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, download.details.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                header_safe_filename(&download.details.filename)
            ),
        )
        .header(header::CONTENT_LENGTH, reader.content_length().to_string())
        .header(header::ACCEPT_RANGES, "bytes");

    response = match reader.range {
        Some((start, end)) => response.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, reader.size),
        ),
        None => response.status(StatusCode::OK),
    };

    response
        .body(Body::from_stream(reader.stream))
        .map_err(|e| VaultError::Internal(format!("Failed to build response: {}", e)))
}

/// Metadata of a stored file
async fn file_details(
    State(ctx): State<AppContext>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> VaultResult<Json<FileDetails>> {
    let id = parse_file_id(&id)?;
    let details = ctx.gate.details(id, caller.owner()).await?;
    Ok(Json(details))
}

/// Unparseable ids are reported like any other unknown file
fn parse_file_id(raw: &str) -> VaultResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| VaultError::NotFound(format!("File {} not found", raw)))
}

/// Keep the filename inside a quoted header parameter
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

/// Parse HTTP Range header
///
/// Accepts "bytes=start-end", "bytes=start-" and "bytes=-suffix". Whether the
/// window fits the blob is decided later against its real size.
fn parse_range(range_header: &str) -> Option<ByteRange> {
    let range_spec = range_header.trim().strip_prefix("bytes=")?;

    // Multiple ranges are not supported
    if range_spec.contains(',') {
        return None;
    }

    let (start_str, end_str) = range_spec.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() {
        // Suffix range: "bytes=-500" (last 500 bytes)
        return end_str.parse::<u64>().ok().map(ByteRange::last);
    }

    let start = start_str.parse::<u64>().ok()?;
    if end_str.is_empty() {
        // Open-ended range: "bytes=500-" (from 500 to end)
        return Some(ByteRange::new(start, None));
    }

    let end = end_str.parse::<u64>().ok()?;
    Some(ByteRange::new(start, Some(end)))
}
