use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader, SyncIoBridge};

use crate::bundle::{build_archive, discard_all};
use crate::error::Error;
use crate::server::AppState;
use crate::server::auth::RequireUser;
use crate::server::dto::BundleResponse;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{PermissionLevel, StagedFile};

/// Decodes the `{app}` and `{release}` path tokens to internal ids.
fn decode_scope(state: &AppState, app: &str, release: &str) -> Result<(i64, i64), ApiError> {
    Ok((state.codec.decode(app)?, state.codec.decode(release)?))
}

/// Maps a multipart read failure onto the API taxonomy: a tripped body
/// limit is 413, everything else is a malformed request.
fn multipart_error(e: &MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum allowed size")
    } else {
        ApiError::bad_request(format!("Failed to read multipart: {e}"))
    }
}

fn require_level(
    state: &AppState,
    app_id: i64,
    user_id: i64,
    levels: &[PermissionLevel],
) -> Result<(), ApiError> {
    if state.store.has_permission(app_id, user_id, levels)? {
        Ok(())
    } else {
        Err(Error::Permission.into())
    }
}

pub async fn upload_bundles(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((app, release)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (app_id, release_id) = decode_scope(&state, &app, &release)?;
    require_level(&state, app_id, auth.user_id, &PermissionLevel::MUTATING)?;

    let mut staged: Vec<StagedFile> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard_all(&staged).await;
                return Err(multipart_error(&e));
            }
        };

        // Only file parts become bundles; other form fields are ignored.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        match state.staging.stage(reader, &file_name).await {
            Ok(file) => staged.push(file),
            Err(e) => {
                // Abort the whole batch; siblings staged so far go with it.
                // A body limit tripped mid-field surfaces here as an io error
                // wrapping the multipart failure.
                discard_all(&staged).await;
                if let Error::Storage(io_err) = &e {
                    if let Some(m) = io_err
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<MultipartError>())
                    {
                        return Err(multipart_error(m));
                    }
                }
                return Err(e.into());
            }
        }
    }

    if staged.is_empty() {
        return Err(ApiError::bad_request("Upload contains no file parts"));
    }

    let bundles = state.pipeline.commit(release_id, staged).await?;

    let responses: Vec<BundleResponse> = bundles
        .into_iter()
        .map(|bundle| BundleResponse::from_bundle(&state.codec, bundle))
        .collect();

    Ok((StatusCode::CREATED, Json(ApiResponse::success(responses))))
}

pub async fn list_bundles(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((app, release)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (app_id, release_id) = decode_scope(&state, &app, &release)?;
    require_level(&state, app_id, auth.user_id, &PermissionLevel::ANY)?;

    let bundles = state.store.list_bundles(release_id)?;

    let responses: Vec<BundleResponse> = bundles
        .into_iter()
        .map(|bundle| BundleResponse::from_bundle(&state.codec, bundle))
        .collect();

    Ok(Json(ApiResponse::success(responses)))
}

pub async fn delete_bundle(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((app, release, bundle)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (app_id, release_id) = decode_scope(&state, &app, &release)?;
    let bundle_id = state.codec.decode(&bundle)?;
    require_level(&state, app_id, auth.user_id, &PermissionLevel::MUTATING)?;

    state
        .store
        .get_bundle(bundle_id, release_id)?
        .or_not_found("Bundle not found")?;
    state.store.remove_bundle(bundle_id, release_id)?;

    Ok(Json(ApiResponse::success(())))
}

pub async fn download_archive(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((app, release)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let (app_id, release_id) = decode_scope(&state, &app, &release)?;
    require_level(&state, app_id, auth.user_id, &PermissionLevel::ANY)?;

    let bundles = state.store.list_bundles(release_id)?;
    let bundle_dir = state.bundle_dir.clone();

    // The zip is packed on a blocking thread into one half of a duplex pipe
    // and flows to the client entry by entry; the whole archive is never
    // held in memory. A failure mid-pack closes the pipe, truncating the
    // response, and is logged here since the status line is already gone.
    let (reader, writer) = tokio::io::duplex(64 * 1024);
    tokio::task::spawn_blocking(move || {
        let sink = SyncIoBridge::new(writer);
        if let Err(e) = build_archive(sink, &bundle_dir, &bundles) {
            tracing::error!("failed to stream release archive: {e}");
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"bundles.zip\"",
            ),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    ))
}
