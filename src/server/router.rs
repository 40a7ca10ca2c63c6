use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;

use super::apps;
use super::bundles;
use crate::bundle::{CommitPipeline, StagingArea};
use crate::codec::IdCodec;
use crate::config::ServerConfig;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub codec: IdCodec,
    pub staging: StagingArea,
    pub pipeline: CommitPipeline,
    pub bundle_dir: PathBuf,
    pub max_upload_size: usize,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, codec: IdCodec, config: &ServerConfig) -> Self {
        Self {
            staging: StagingArea::new(config.temp_dir()),
            pipeline: CommitPipeline::new(store.clone(), config.bundle_dir()),
            bundle_dir: config.bundle_dir(),
            max_upload_size: config.max_upload_size,
            store,
            codec,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_size = state.max_upload_size;

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/apps", post(apps::create_app).get(apps::list_apps))
        .route(
            "/api/v1/apps/{app}",
            get(apps::get_app)
                .put(apps::update_app)
                .delete(apps::remove_app),
        )
        .route(
            "/api/v1/apps/{app}/releases/{release}/bundles",
            post(bundles::upload_bundles).get(bundles::list_bundles),
        )
        .route(
            "/api/v1/apps/{app}/releases/{release}/bundles/download",
            get(bundles::download_archive),
        )
        .route(
            "/api/v1/apps/{app}/releases/{release}/bundles/{bundle}",
            delete(bundles::delete_bundle),
        )
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
