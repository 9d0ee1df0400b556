use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, http::HeaderValue, routing, Router};
use axum_util::logger::{LoggerConfig, LoggerLayer};
use log::Level;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};

use crate::{config::Config, store::VideoStore};

mod delete_video;
mod error;
mod list_videos;
mod stream_video;
mod upload_video;

/// Shared by every handler; built once from [`Config`].
pub struct AppState {
    pub store: VideoStore,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            store: VideoStore::new(&config.upload_dir),
            max_file_size: config.max_file_size,
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }
}

async fn health() {}

/// The JSON API without transport layers.
pub fn api(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/videos", routing::get(list_videos::list_videos))
        .route(
            "/api/videos/:filename",
            routing::delete(delete_video::delete_video),
        )
        .route("/api/upload", routing::post(upload_video::upload_video))
        .route(
            "/api/stream/:filename",
            routing::get(stream_video::stream_video),
        )
        .route("/health", routing::get(health))
        // upload size is enforced while the body streams to disk
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

fn cors(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|x| x == "*") {
        return Ok(CorsLayer::permissive());
    }
    let origins = allowed_origins
        .iter()
        .map(|x| {
            x.parse::<HeaderValue>()
                .with_context(|| format!("invalid allowed origin '{x}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn route(config: &Config, state: Arc<AppState>) -> Result<Router> {
    let mut router = api(state);
    if let Some(static_dir) = &config.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }
    Ok(router
        .layer(cors(&config.allowed_origins)?)
        .layer(LoggerLayer::new(LoggerConfig {
            log_level_filter: Arc::new(|x| {
                if x == "/health" {
                    Level::Debug
                } else {
                    Level::Info
                }
            }),
            honor_xff: true,
            metric_name: "vidshare_web_responses".to_string(),
        })))
}
