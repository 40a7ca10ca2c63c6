use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::auth::RequireUser;
use crate::server::dto::{AppResponse, CreateAppRequest, UpdateAppRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{AppUpdate, AppWithPermission, NewApp, PermissionLevel};

pub async fn create_app(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAppRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("App name cannot be empty"));
    }

    let app = state.store.create_app(
        auth.user_id,
        &NewApp {
            name: req.name,
            public_key: req.public_key,
            private_key: req.private_key,
        },
    )?;

    let response = AppResponse::from_app(
        &state.codec,
        AppWithPermission {
            app,
            permission: PermissionLevel::Owner,
        },
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn list_apps(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let apps = state.store.list_apps(auth.user_id)?;

    let responses: Vec<AppResponse> = apps
        .into_iter()
        .map(|app| AppResponse::from_app(&state.codec, app))
        .collect();

    Ok(Json(ApiResponse::success(responses)))
}

pub async fn get_app(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app_id = state.codec.decode(&app)?;

    let app = state
        .store
        .find_app(app_id, auth.user_id)?
        .or_not_found("App not found")?;

    Ok(Json(ApiResponse::success(AppResponse::from_app(
        &state.codec,
        app,
    ))))
}

pub async fn update_app(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
    Json(req): Json<UpdateAppRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app_id = state.codec.decode(&app)?;

    // Half a key pair is rejected on update as well as on create.
    if req.public_key.is_empty() != req.private_key.is_empty() {
        return Err(ApiError::bad_request(
            "public and private keys must be provided together",
        ));
    }

    state.store.update_app(
        app_id,
        auth.user_id,
        &AppUpdate {
            name: req.name,
            public_key: req.public_key,
            private_key: req.private_key,
            private: req.private,
        },
    )?;

    Ok(Json(ApiResponse::success(())))
}

pub async fn remove_app(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app_id = state.codec.decode(&app)?;

    state.store.remove_app(app_id, auth.user_id)?;

    Ok(Json(ApiResponse::success(())))
}
