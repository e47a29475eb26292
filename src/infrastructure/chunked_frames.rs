// Chunked streaming of length-prefixed JSON frames
use crate::domain::progress::ProgressEvent;
use crate::infrastructure::framing::encode_frame;
use crate::infrastructure::http_response::brotli;
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

pub const FRAME_CONTENT_TYPE: &str = "application/x-ndframe+json";

/// Build a chunked response with one frame per stream item
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_frame(&msg, compress).await });

    // frames are compressed one by one, so the response itself carries no
    // Content-Encoding
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// JSON-encode one message, optionally Brotli it, and length-prefix it
pub async fn serialize_frame<T: Serialize>(msg: &T, compress: bool) -> std::io::Result<Bytes> {
    let json = serde_json::to_vec(msg).map_err(std::io::Error::other)?;
    let payload = if compress { brotli(json).await? } else { json };
    Ok(encode_frame(&payload))
}

/// Stream session events until the terminal one has been sent
pub fn stream_from_receiver(
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    compress: bool,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.phase.is_terminal();
            yield event;
            if terminal {
                break;
            }
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
