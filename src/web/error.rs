use axum::{
    extract::multipart::MultipartError,
    headers::{ContentRange, HeaderMapExt},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Video not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UploadRejected(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable { length: u64 },
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound | StoreError::InvalidName(_) => ApiError::NotFound,
            StoreError::Io(e) => ApiError::Other(e.into()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Other(e.into())
    }
}

impl From<axum::http::Error> for ApiError {
    fn from(e: axum::http::Error) -> Self {
        ApiError::Other(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::UploadRejected(_) | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Other(e) => {
                error!("request failed: {e:?}");
                // outermost context only, causes stay in the log
                e.to_string()
            }
            other => other.to_string(),
        };
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let ApiError::RangeNotSatisfiable { length } = self {
            response
                .headers_mut()
                .typed_insert(ContentRange::unsatisfied_bytes(length));
        }
        response
    }
}
