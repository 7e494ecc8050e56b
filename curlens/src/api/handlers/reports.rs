use crate::AppState;
use crate::api::models::reports::{
    AnalyticsResponse, ReportRowsResponse, SelectViewRequest, ViewListResponse,
};
use crate::errors::{Error, Result};
use crate::report::export_rows;
use axum::{
    Json,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

#[utoipa::path(
    post,
    path = "/reports",
    tag = "reports",
    summary = "Upload a CUR export",
    description = "Upload a .parquet Cost and Usage Report export. The file is validated locally, \
        forwarded to the processing function, and the returned consumption records become the \
        session's report batch. The response carries the default (all records) view.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart upload with a single `file` field"
    ),
    responses(
        (status = 200, description = "Report loaded", body = ReportRowsResponse),
        (status = 400, description = "Invalid upload"),
        (status = 413, description = "Payload too large"),
        (status = 502, description = "Processing service unreachable")
    )
)]
pub async fn upload_report(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<ReportRowsResponse>> {
    let mut filename: Option<String> = None;
    let mut contents: Vec<u8> = Vec::new();

    let max_file_size = state.config.upload.max_file_size;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());

                // Stream chunks so oversized uploads fail fast, before the
                // whole body is buffered.
                let mut chunk_stream = field;
                while let Some(chunk) = chunk_stream.chunk().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read file chunk: {}", e),
                })? {
                    if (contents.len() + chunk.len()) as u64 > max_file_size {
                        tracing::warn!(
                            filename = ?filename,
                            max_file_size,
                            "File size limit exceeded, aborting upload"
                        );
                        return Err(Error::PayloadTooLarge {
                            message: format!(
                                "File size exceeds maximum allowed size of {} bytes ({} MB)",
                                max_file_size,
                                max_file_size / (1024 * 1024)
                            ),
                        });
                    }
                    contents.extend_from_slice(&chunk);
                }
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    let filename = filename.ok_or_else(|| Error::BadRequest {
        message: "Missing required field: 'file'".to_string(),
    })?;

    // Local validation happens entirely before any network call; the
    // session batch is untouched on every rejection path.
    let extension = &state.config.upload.allowed_extension;
    if !filename.to_ascii_lowercase().ends_with(extension) {
        return Err(Error::BadRequest {
            message: format!("Invalid file type. Please upload a {extension} file."),
        });
    }

    if contents.is_empty() {
        return Err(Error::BadRequest {
            message: "File cannot be empty".to_string(),
        });
    }

    if (contents.len() as u64) < state.config.upload.min_file_size {
        return Err(Error::BadRequest {
            message: format!(
                "File is too small ({} bytes) to be a valid report export",
                contents.len()
            ),
        });
    }

    let size = contents.len();
    let records = state.processor.process(&filename, contents).await?;

    tracing::info!(filename, size, records = records.len(), "Report batch loaded");

    // The processor call is awaited without holding the session lock; the
    // batch is swapped in only on success.
    let mut session = state.session.write().await;
    let report = session.load(records);

    Ok(Json(ReportRowsResponse::from_report(report)))
}

#[utoipa::path(
    get,
    path = "/reports/current",
    tag = "reports",
    summary = "Rows of the active view",
    responses(
        (status = 200, description = "Rows and columns of the active view", body = ReportRowsResponse),
        (status = 404, description = "No report loaded")
    )
)]
pub async fn get_report(State(state): State<AppState>) -> Result<Json<ReportRowsResponse>> {
    let session = state.session.read().await;
    let report = session.loaded().ok_or(Error::NoReport)?;
    Ok(Json(ReportRowsResponse::from_report(report)))
}

#[utoipa::path(
    get,
    path = "/reports/current/views",
    tag = "reports",
    summary = "List selectable views",
    responses(
        (status = 200, description = "All records, one view per service, and analytics", body = ViewListResponse),
        (status = 404, description = "No report loaded")
    )
)]
pub async fn list_views(State(state): State<AppState>) -> Result<Json<ViewListResponse>> {
    let session = state.session.read().await;
    let report = session.loaded().ok_or(Error::NoReport)?;
    Ok(Json(ViewListResponse::from_report(report)))
}

#[utoipa::path(
    put,
    path = "/reports/current/view",
    tag = "reports",
    summary = "Select the active view",
    description = "Selecting a view filters rows, never columns. A service view that matches no \
        service resolves to an empty row set rather than an error.",
    request_body = SelectViewRequest,
    responses(
        (status = 200, description = "Rows of the newly selected view", body = ReportRowsResponse),
        (status = 404, description = "No report loaded")
    )
)]
pub async fn select_view(
    State(state): State<AppState>,
    Json(request): Json<SelectViewRequest>,
) -> Result<Json<ReportRowsResponse>> {
    let mut session = state.session.write().await;
    let report = session.loaded_mut().ok_or(Error::NoReport)?;
    report.select_view(request.view);
    Ok(Json(ReportRowsResponse::from_report(report)))
}

#[utoipa::path(
    get,
    path = "/reports/current/analytics",
    tag = "reports",
    summary = "Analytics for the current batch",
    responses(
        (status = 200, description = "Per-unit aggregation, composite totals, and ranking", body = AnalyticsResponse),
        (status = 404, description = "No report loaded")
    )
)]
pub async fn get_analytics(State(state): State<AppState>) -> Result<Json<AnalyticsResponse>> {
    let session = state.session.read().await;
    let report = session.loaded().ok_or(Error::NoReport)?;
    Ok(Json(AnalyticsResponse::from_result(report.analytics())))
}

#[utoipa::path(
    get,
    path = "/reports/current/export",
    tag = "reports",
    summary = "Export the active view",
    description = "Serializes the visible rows of the active view as an indented JSON document \
        with a deterministic filename.",
    responses(
        (status = 200, description = "Downloadable report document", content_type = "application/json"),
        (status = 400, description = "The analytics view has no row export"),
        (status = 404, description = "No report loaded")
    )
)]
pub async fn export_report(State(state): State<AppState>) -> Result<Response> {
    let session = state.session.read().await;
    let report = session.loaded().ok_or(Error::NoReport)?;

    let view = report.effective_view();
    let document = export_rows(report.visible_rows(), &view)?;

    tracing::info!(filename = %document.filename, bytes = document.bytes.len(), "Exporting report view");

    let headers = [
        (header::CONTENT_TYPE, document.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.filename),
        ),
    ];
    Ok((headers, document.bytes).into_response())
}

#[utoipa::path(
    delete,
    path = "/reports/current",
    tag = "reports",
    summary = "Discard the current report",
    description = "Clears the batch and all derived state; the session returns to its initial \
        no-report state. Idempotent.",
    responses(
        (status = 204, description = "Session cleared")
    )
)]
pub async fn clear_report(State(state): State<AppState>) -> StatusCode {
    state.session.write().await.clear();
    StatusCode::NO_CONTENT
}
