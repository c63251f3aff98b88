//! 变更推送 (Server-Sent Events)
//!
//! [`publisher`] 负责每个连接的推送循环，本模块把事件流转换为 axum SSE 响应。

pub mod publisher;

pub use publisher::{FeedHub, FeedSettings, OrderFeedSource};

use std::convert::Infallible;

use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::StreamExt;
use shared::feed::FeedEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// 将推送事件转换为 SSE 帧
pub fn to_sse_event(event: &FeedEvent) -> Event {
    match event.to_data() {
        Ok(data) => Event::default().event(event.event_name()).data(data),
        Err(e) => {
            tracing::error!(error = %e, event = event.event_name(), "Failed to encode feed event");
            Event::default()
                .event(shared::feed::EVENT_ERROR)
                .data(r#"{"type":"error","message":"encode failed"}"#)
        }
    }
}

fn into_stream(rx: mpsc::Receiver<FeedEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)))
}

/// SSE 响应 (禁用缓存，保持连接)
pub fn sse_response(rx: mpsc::Receiver<FeedEvent>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    (headers, Sse::new(into_stream(rx)).keep_alive(KeepAlive::new())).into_response()
}
