use crate::activity::filter::{FilterField, TimeWindow, filter_activities};
use crate::activity::{self, ActivityView, NewActivity};
use crate::api::get_embedded_asset;
use crate::blob::BlobStore;
use crate::clipboard::{self, ClipboardUpdate};
use crate::config::Config;
use crate::db::{ClipboardRow, Database, Table};
use crate::error::StoreError;
use crate::events::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::files::{self, FileView, NewFile};
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{Local, Utc};
use futures::Stream;
use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub blobs: Arc<BlobStore>,
    pub feed: ChangeFeed,
}

impl ApiState {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let blobs = Arc::new(BlobStore::from_config(&config)?);

        Ok(Self {
            config,
            blobs,
            feed: ChangeFeed::default(),
        })
    }

    fn database(&self) -> Result<Database> {
        Database::open(&self.config.db_path)
    }
}

pub fn router(state: ApiState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/activities", get(activity_list).post(activity_add))
        .route("/api/v1/activities/:id", delete(activity_delete))
        .route("/api/v1/clipboard", get(clipboard_get).put(clipboard_put))
        .route("/api/v1/clipboard/:id", delete(clipboard_clear))
        .route("/api/v1/files", get(file_list).post(file_register))
        .route("/api/v1/files/upload-url", post(upload_url))
        .route("/api/v1/files/download-url", post(download_url))
        .route(
            "/api/v1/upload/:token",
            post(upload_blob).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/blobs/:blob_id", get(blob_download))
        .route("/api/v1/events", get(events))
        .fallback(get(static_assets))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ActivitiesQuery {
    filter: Option<String>,
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    blob_id: String,
}

#[derive(Debug, Serialize)]
struct ActivitiesPayload {
    filter: TimeWindow,
    field: &'static str,
    count: usize,
    activities: Vec<ActivityView>,
}

#[derive(Debug, Serialize)]
struct ClipboardPayload {
    entry: Option<ClipboardRow>,
}

#[derive(Debug, Serialize)]
struct FilesPayload {
    files: Vec<FileView>,
}

#[derive(Debug, Serialize)]
struct UrlPayload {
    url: String,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    api_port: u16,
    base_url: String,
    activities: i64,
    clipboard_rows: i64,
    files: i64,
    blobs: i64,
    max_upload_bytes: u64,
    activity_filter_field: &'static str,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = state.database()?;

    Ok(Json(StatusPayload {
        api_port: state.config.api_port,
        base_url: state.config.base_url(),
        activities: database.count_rows(Table::Activities)?,
        clipboard_rows: database.count_rows(Table::Clipboard)?,
        files: database.count_rows(Table::Files)?,
        blobs: database.count_rows(Table::Blobs)?,
        max_upload_bytes: state.config.max_upload_bytes,
        activity_filter_field: state.config.activity_filter_field.as_str(),
    }))
}

async fn activity_list(
    State(state): State<ApiState>,
    Query(query): Query<ActivitiesQuery>,
) -> ApiResult<Json<ActivitiesPayload>> {
    let window = query
        .filter
        .as_deref()
        .map(TimeWindow::parse)
        .unwrap_or(TimeWindow::All);
    let field = match query.field.as_deref() {
        Some(raw) => FilterField::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Unknown filter field: {raw}. Use date or created_at"))
        })?,
        None => state.config.activity_filter_field,
    };

    let database = state.database()?;
    let records = activity::list_activities(&database)?;
    let activities = filter_activities(&records, window, field, &Local::now())
        .into_iter()
        .map(ActivityView::from)
        .collect::<Vec<_>>();

    Ok(Json(ActivitiesPayload {
        filter: window,
        field: field.as_str(),
        count: activities.len(),
        activities,
    }))
}

async fn activity_add(
    State(state): State<ApiState>,
    Json(payload): Json<NewActivity>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let database = state.database()?;
    let id = activity::add_activity(&database, &payload, now_ms())?;
    state.feed.publish(Table::Activities, ChangeKind::Inserted, id);

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn activity_delete(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let database = state.database()?;
    activity::delete_activity(&database, id)?;
    state.feed.publish(Table::Activities, ChangeKind::Deleted, id);

    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn clipboard_get(State(state): State<ApiState>) -> ApiResult<Json<ClipboardPayload>> {
    let database = state.database()?;

    Ok(Json(ClipboardPayload {
        entry: clipboard::current(&database)?,
    }))
}

async fn clipboard_put(
    State(state): State<ApiState>,
    Json(payload): Json<ClipboardUpdate>,
) -> ApiResult<Json<ClipboardRow>> {
    let database = state.database()?;
    let entry = clipboard::upsert(&database, &payload, now_ms())?;
    let kind = if payload.id.is_some() {
        ChangeKind::Patched
    } else {
        ChangeKind::Inserted
    };
    state.feed.publish(Table::Clipboard, kind, entry.id);

    Ok(Json(entry))
}

async fn clipboard_clear(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let database = state.database()?;
    clipboard::clear(&database, id)?;
    state.feed.publish(Table::Clipboard, ChangeKind::Deleted, id);

    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn file_list(State(state): State<ApiState>) -> ApiResult<Json<FilesPayload>> {
    let database = state.database()?;

    Ok(Json(FilesPayload {
        files: files::list_files(&database, &state.blobs)?,
    }))
}

async fn file_register(
    State(state): State<ApiState>,
    Json(payload): Json<NewFile>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let database = state.database()?;
    let id = files::register_file(&database, &state.blobs, &payload, now_ms())?;
    state.feed.publish(Table::Files, ChangeKind::Inserted, id);

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn upload_url(State(state): State<ApiState>) -> ApiResult<Json<UrlPayload>> {
    let database = state.database()?;
    let url = state.blobs.request_upload_url(&database, now_ms())?;

    Ok(Json(UrlPayload {
        url: url.to_string(),
    }))
}

async fn upload_blob(
    State(state): State<ApiState>,
    Path(token): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let database = state.database()?;
    let blob = state.blobs.accept_upload(
        &database,
        &token,
        &body,
        content_type,
        query.name.as_deref(),
        now_ms(),
    )?;

    info!(blob_id = %blob.blob_id, size = blob.size, "blob stored");

    Ok(Json(json!({
        "blob_id": blob.blob_id,
        "name": blob.name,
        "size": blob.size,
        "content_type": blob.content_type
    })))
}

async fn download_url(
    State(state): State<ApiState>,
    Json(payload): Json<DownloadRequest>,
) -> ApiResult<Json<UrlPayload>> {
    let database = state.database()?;
    let url = state
        .blobs
        .download_url(&database, payload.blob_id.trim())?
        .ok_or_else(|| ApiError::NotFound(format!("Blob not found: {}", payload.blob_id)))?;

    Ok(Json(UrlPayload {
        url: url.to_string(),
    }))
}

async fn blob_download(
    State(state): State<ApiState>,
    Path(blob_id): Path<String>,
) -> ApiResult<Response> {
    let database = state.database()?;
    let (blob, bytes) = state.blobs.read(&database, &blob_id)?;

    let mut response = Response::new(bytes.into_response().into_body());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&blob.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let filename = blob.name.replace(['"', '\\', '\r', '\n'], "_");
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok(response)
}

async fn events(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let receiver = state.feed.subscribe();

    let changes = stream::unfold(receiver, |mut receiver| async move {
        let event = match receiver.recv().await {
            Ok(change) => change_event(&change),
            // Subscriber fell behind; it should re-query everything.
            Err(RecvError::Lagged(skipped)) => {
                Event::default().event("resync").data(skipped.to_string())
            }
            Err(RecvError::Closed) => return None,
        };

        Some((Ok(event), receiver))
    });

    Sse::new(changes).keep_alive(KeepAlive::default())
}

fn change_event(change: &ChangeEvent) -> Event {
    Event::default()
        .event("change")
        .json_data(change)
        .unwrap_or_else(|_| Event::default().event("resync"))
}

async fn static_assets(uri: Uri) -> ApiResult<Response> {
    let path = uri.path();

    match get_embedded_asset(path) {
        Some((bytes, mime)) => {
            let mut response = Response::new(bytes.into_response().into_body());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime)?);
            Ok(response)
        }
        None => Err(ApiError::NotFound("Static asset not found".to_string())),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(message) => Self::BadRequest(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            oversize @ StoreError::Oversize { .. } => Self::PayloadTooLarge(oversize.to_string()),
            transfer @ StoreError::Transfer(_) => Self::BadGateway(transfer.to_string()),
            StoreError::Internal(error) => Self::Internal(error),
        }
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal error, please try again" })),
                )
                    .into_response()
            }
        }
    }
}
