use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use log::info;
use serde::Serialize;

use super::{error::ApiResult, AppState};

#[derive(Serialize, Debug)]
pub struct DeleteResponse {
    pub message: String,
}

// an in-flight stream of the same file keeps its open handle and finishes on unix
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.store.delete(&filename).await?;
    info!("deleted '{filename}'");
    Ok(Json(DeleteResponse {
        message: "Video deleted successfully".to_string(),
    }))
}
