use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::store::StoredVideo;

use super::{error::ApiResult, AppState};

// everything but the characters left alone by JavaScript's encodeURIComponent
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub name: String,
    pub size: u64,
    pub size_formatted: String,
    pub upload_date: DateTime<Utc>,
    pub path: String,
}

impl From<StoredVideo> for VideoEntry {
    fn from(video: StoredVideo) -> Self {
        Self {
            path: format!("/api/stream/{}", utf8_percent_encode(&video.name, PATH_SEGMENT)),
            size_formatted: format_file_size(video.size),
            size: video.size,
            upload_date: video.created,
            name: video.name,
        }
    }
}

/// Formats a byte count with 1024-based units, at most two decimals and no trailing zeros.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{scaled:.2}");
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{rounded} {}", UNITS[unit])
}

pub async fn list_videos(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<VideoEntry>>> {
    let videos = state
        .store
        .list()
        .await
        .context("Failed to get videos list")?;
    Ok(Json(videos.into_iter().map(VideoEntry::from).collect()))
}
