use std::{
    io::SeekFrom,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::{Body, BoxBody, Bytes, HttpBody},
    extract::{Path, State},
    headers::{ContentRange, HeaderMapExt},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use futures::Stream;
use log::{debug, error, info};
use pin_project::{pin_project, pinned_drop};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::{
    metrics::{STREAM_ABORTED, STREAM_BYTES, STREAM_RESPONSES},
    range,
};

use super::{
    error::{ApiError, ApiResult},
    AppState,
};

const READ_CHUNK: usize = 64 * 1024;

fn content_type_for(filename: &str) -> &'static str {
    mime_guess::from_path(filename)
        .first_raw()
        .filter(|x| x.starts_with("video/"))
        .unwrap_or("video/mp4")
}

/// Byte stream of one response body. Dropping it releases the file handle; a drop
/// before `expected` bytes were yielded means the client went away.
#[pin_project(PinnedDrop)]
struct ServedStream<S> {
    #[pin]
    inner: S,
    filename: String,
    sent: u64,
    expected: u64,
}

impl<S: Stream<Item = std::io::Result<Bytes>>> Stream for ServedStream<S> {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let next = this.inner.poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &next {
            *this.sent += chunk.len() as u64;
            STREAM_BYTES.inc_by(chunk.len() as u64);
        }
        next
    }
}

#[pinned_drop]
impl<S> PinnedDrop for ServedStream<S> {
    fn drop(self: Pin<&mut Self>) {
        if self.sent < self.expected {
            STREAM_ABORTED.inc();
            info!(
                "stream of '{}' closed after {} of {} bytes",
                self.filename, self.sent, self.expected
            );
        }
    }
}

pub async fn stream_video(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let (mut file, length) = match state.store.open(&filename).await {
        Ok(opened) => opened,
        Err(e) => {
            let e = ApiError::from(e);
            STREAM_RESPONSES
                .with_label_values(&[e.status().as_str()])
                .inc();
            return Err(e);
        }
    };

    let range_header = headers
        .get(header::RANGE)
        .map(|x| x.to_str().unwrap_or_default());
    let range = match range::resolve(range_header, length) {
        Ok(range) => range,
        Err(e) => {
            debug!("rejecting range for '{filename}': {e}");
            STREAM_RESPONSES
                .with_label_values(&[StatusCode::RANGE_NOT_SATISFIABLE.as_str()])
                .inc();
            return Err(ApiError::RangeNotSatisfiable { length });
        }
    };

    let (start, bounded_length) = match range {
        Some(range) => (range.start, range.len()),
        None => (0, length),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }

    let stream = ServedStream {
        inner: ReaderStream::with_capacity(file.take(bounded_length), READ_CHUNK),
        filename: filename.clone(),
        sent: 0,
        expected: bounded_length,
    };

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, bounded_length.to_string())
        .body(BoxBody::new(Body::wrap_stream(stream).map_err(|e| {
            error!("video stream error: {e:?}");
            axum::Error::new(e)
        })))?;

    if let Some(range) = range {
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        let content_range = ContentRange::bytes(range.start..=range.end, length)
            .map_err(|_| ApiError::RangeNotSatisfiable { length })?;
        response.headers_mut().typed_insert(content_range);
    }
    STREAM_RESPONSES
        .with_label_values(&[response.status().as_str()])
        .inc();

    Ok(response)
}
