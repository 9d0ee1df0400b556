use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use log::{info, warn};
use serde::Serialize;

use crate::{metrics::UPLOADS, store::StoreError};

use super::{
    error::{ApiError, ApiResult},
    list_videos::format_file_size,
    AppState,
};

const VIDEO_FIELD: &str = "video";

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub size: u64,
}

/// Accepts a filename whose extension is allowed and whose declared part type, if any, is a video.
pub fn is_allowed_video(
    filename: &str,
    content_type: Option<&str>,
    allowed_extensions: &[String],
) -> bool {
    let extension = match filename.rsplit_once('.') {
        Some((_, extension)) => extension.to_lowercase(),
        None => return false,
    };
    if !allowed_extensions.iter().any(|x| *x == extension) {
        return false;
    }
    match content_type {
        None => true,
        Some(content_type) => {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase();
            mime.starts_with("video/") || mime == "application/octet-stream"
        }
    }
}

pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let out = receive_upload(&state, multipart).await;
    match &out {
        Ok(uploaded) => {
            UPLOADS.with_label_values(&["accepted"]).inc();
            info!("stored upload '{}' ({} bytes)", uploaded.filename, uploaded.size);
        }
        Err(e) => {
            UPLOADS.with_label_values(&["rejected"]).inc();
            warn!("upload rejected: {e}");
        }
    }
    out.map(Json)
}

async fn receive_upload(state: &AppState, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            return Err(ApiError::BadRequest("No video file uploaded".to_string()));
        };
        if !is_allowed_video(
            &original_name,
            field.content_type(),
            &state.allowed_extensions,
        ) {
            return Err(ApiError::UploadRejected(
                "Only video files are allowed!".to_string(),
            ));
        }

        let mut upload = state
            .store
            .begin_upload(&original_name)
            .await
            .map_err(|e| match e {
                StoreError::InvalidName(_) => {
                    ApiError::UploadRejected("Only video files are allowed!".to_string())
                }
                other => other.into(),
            })?;
        let received: ApiResult<()> = async {
            while let Some(chunk) = field.chunk().await? {
                if upload.written() + chunk.len() as u64 > state.max_file_size {
                    return Err(ApiError::PayloadTooLarge(format!(
                        "File too large. Maximum size is {}.",
                        format_file_size(state.max_file_size)
                    )));
                }
                upload.write(&chunk).await?;
            }
            Ok(())
        }
        .await;
        if let Err(e) = received {
            upload.discard().await;
            return Err(e);
        }
        let stored = upload.commit().await?;

        return Ok(UploadResponse {
            message: "Video uploaded successfully".to_string(),
            filename: stored.name,
            size: stored.size,
        });
    }
    Err(ApiError::BadRequest("No video file uploaded".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        ["mp4", "mov", "webm"].into_iter().map(String::from).collect()
    }

    #[test]
    fn accepts_known_video_types() {
        assert!(is_allowed_video("clip.mp4", Some("video/mp4"), &allowed()));
        assert!(is_allowed_video("Clip.MOV", Some("video/quicktime"), &allowed()));
        assert!(is_allowed_video("clip.webm", None, &allowed()));
        assert!(is_allowed_video("clip.mp4", Some("application/octet-stream"), &allowed()));
        assert!(is_allowed_video("clip.mp4", Some("Video/MP4; codecs=avc1"), &allowed()));
    }

    #[test]
    fn rejects_other_types() {
        assert!(!is_allowed_video("notes.txt", Some("text/plain"), &allowed()));
        assert!(!is_allowed_video("notes.txt", Some("video/mp4"), &allowed()));
        assert!(!is_allowed_video("clip.mp4", Some("image/png"), &allowed()));
        assert!(!is_allowed_video("mp4", None, &allowed()));
        assert!(!is_allowed_video("clip.mkv", Some("video/x-matroska"), &allowed()));
    }
}
