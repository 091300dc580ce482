//! HTTP handlers for a deposit's file collection.
//!
//! - `GET    /deposit/{pid}/files`               list files in order
//! - `POST   /deposit/{pid}/files`               upload (multipart `file` + `name`)
//! - `PUT    /deposit/{pid}/files`               reorder (`[{"id": key}, ...]`)
//! - `GET    /deposit/{pid}/files/{key}`         file representation
//! - `PUT    /deposit/{pid}/files/{key}`         rename (`{"filename": new}`)
//! - `DELETE /deposit/{pid}/files/{key}`         detach
//! - `GET    /deposit/{pid}/files/{key}/content` download payload
//!
//! Request bodies are only read after the authorization gate, so callers
//! that fail the gate never get a 400 for their payload.

use crate::{
    errors::AppError,
    handlers::context::{Access, RequestContext},
    models::{
        file_entry::{FileEntry, FileInstance, FileResponse},
        user::Identity,
    },
    state::AppState,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

/// One element of the reorder payload.
#[derive(Debug, Deserialize)]
pub struct OrderItem {
    pub id: String,
}

/// Body of the rename request.
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub filename: String,
}

fn render(ctx: &RequestContext) -> Json<Vec<FileResponse>> {
    Json(ctx.deposit.files.list().iter().map(FileResponse::from).collect())
}

/// Keeps the status axum assigns: 400 for malformed bodies, 413 past the
/// body limit.
fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))
}

/// GET `/deposit/{pid}/files`
pub async fn list_files(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    identity: Identity,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let ctx = RequestContext::load(&state, &pid, &identity, Access::Read).await?;
    Ok(render(&ctx))
}

/// POST `/deposit/{pid}/files`: stream the `file` part into the content store
/// and append it under `name` (or the part's filename).
pub async fn upload_file(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut ctx = RequestContext::load(&state, &pid, &identity, Access::Write).await?;
    let mut multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;

    let mut stored: Option<(FileInstance, Option<String>)> = None;
    let mut name: Option<String> = None;

    let parsed = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                "file" if stored.is_none() => {
                    let filename = field.file_name().map(str::to_string);
                    let mut body_error: Option<AppError> = None;
                    let chunks = field.map(|chunk| {
                        chunk.map_err(|e| {
                            let err = io::Error::other(e.body_text());
                            body_error = Some(multipart_error(e));
                            err
                        })
                    });
                    let result = state
                        .storage
                        .store_stream(ctx.deposit.bucket_id, chunks)
                        .await;
                    match result {
                        Ok(instance) => stored = Some((instance, filename)),
                        Err(err) => return Err(body_error.unwrap_or_else(|| err.into())),
                    }
                }
                "name" => {
                    name = Some(field.text().await.map_err(multipart_error)?);
                }
                other => warn!("ignoring multipart field `{}`", other),
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    let Some((instance, filename)) = stored else {
        parsed?;
        return Err(AppError::bad_request("missing `file` part"));
    };

    let key = name
        .filter(|n| !n.is_empty())
        .or(filename.filter(|n| !n.is_empty()));
    let outcome = match (parsed, key) {
        (Err(err), _) => Err(err),
        (Ok(()), None) => Err(AppError::bad_request("missing file name")),
        (Ok(()), Some(key)) => attach(&state, &mut ctx, key, instance.clone()).await,
    };

    match outcome {
        Ok(response) => {
            info!(
                user = %ctx.user_id,
                deposit = %ctx.deposit.pid,
                key = %response.filename,
                size = instance.size,
                "file uploaded"
            );
            Ok((StatusCode::CREATED, Json(response)).into_response())
        }
        Err(err) => {
            if let Err(cleanup) = state.storage.remove_file(&instance).await {
                error!("failed to discard upload {}: {}", instance.id, cleanup);
            }
            Err(err)
        }
    }
}

async fn attach(
    state: &AppState,
    ctx: &mut RequestContext,
    key: String,
    instance: FileInstance,
) -> Result<FileResponse, AppError> {
    let response = FileResponse::from(ctx.deposit.files.add(FileEntry::new(key, instance))?);
    state.deposits.commit(&mut ctx.deposit).await?;
    Ok(response)
}

/// PUT `/deposit/{pid}/files`: reorder the collection.
pub async fn reorder_files(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    identity: Identity,
    body: Bytes,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let mut ctx = RequestContext::load(&state, &pid, &identity, Access::Write).await?;
    let order: Vec<OrderItem> = parse_json(&body)?;
    let keys: Vec<&str> = order.iter().map(|item| item.id.as_str()).collect();

    ctx.deposit.files.reorder(&keys)?;
    state.deposits.commit(&mut ctx.deposit).await?;

    info!(user = %ctx.user_id, deposit = %ctx.deposit.pid, "files reordered");
    Ok(render(&ctx))
}

/// GET `/deposit/{pid}/files/{key}`
pub async fn get_file(
    State(state): State<AppState>,
    Path((pid, key)): Path<(String, String)>,
    identity: Identity,
) -> Result<Json<FileResponse>, AppError> {
    let ctx = RequestContext::load(&state, &pid, &identity, Access::Read).await?;
    Ok(Json(FileResponse::from(ctx.deposit.files.get(&key)?)))
}

/// PUT `/deposit/{pid}/files/{key}`: rename a file, keeping its content.
pub async fn rename_file(
    State(state): State<AppState>,
    Path((pid, key)): Path<(String, String)>,
    identity: Identity,
    body: Bytes,
) -> Result<Json<FileResponse>, AppError> {
    let mut ctx = RequestContext::load(&state, &pid, &identity, Access::Write).await?;
    ctx.deposit.files.get(&key)?;
    let request: RenameRequest = parse_json(&body)?;

    let response = FileResponse::from(ctx.deposit.files.rename(&key, &request.filename)?);
    state.deposits.commit(&mut ctx.deposit).await?;

    info!(
        user = %ctx.user_id,
        deposit = %ctx.deposit.pid,
        from = %key,
        to = %request.filename,
        "file renamed"
    );
    Ok(Json(response))
}

/// DELETE `/deposit/{pid}/files/{key}`: detach a file and drop its payload.
pub async fn delete_file(
    State(state): State<AppState>,
    Path((pid, key)): Path<(String, String)>,
    identity: Identity,
) -> Result<StatusCode, AppError> {
    let mut ctx = RequestContext::load(&state, &pid, &identity, Access::Write).await?;
    let removed = ctx.deposit.files.remove(&key)?;
    state.deposits.commit(&mut ctx.deposit).await?;

    if let Err(err) = state.storage.remove_file(&removed.file).await {
        error!("failed to remove payload of {}: {}", removed.file.id, err);
    }

    info!(user = %ctx.user_id, deposit = %ctx.deposit.pid, key = %key, "file deleted");
    if ctx.deposit.files.is_empty() {
        debug!(deposit = %ctx.deposit.pid, "deposit has no files left");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/deposit/{pid}/files/{key}/content`: stream the stored bytes.
pub async fn download_file(
    State(state): State<AppState>,
    Path((pid, key)): Path<(String, String)>,
    identity: Identity,
) -> Result<Response, AppError> {
    let ctx = RequestContext::load(&state, &pid, &identity, Access::Read).await?;
    let entry = ctx.deposit.files.get(&key)?;
    let file = state.storage.open_file(&entry.file).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    set_file_headers(response.headers_mut(), &entry.file);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, file: &FileInstance) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size.max(0)));

    let digest = file
        .checksum
        .split_once(':')
        .map_or(file.checksum.as_str(), |(_, hex)| hex);
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", digest)) {
        headers.insert(header::ETAG, value);
    }
}
