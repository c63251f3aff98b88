//! SSE 帧解析
//!
//! 只实现推送通道用到的子集：`event:` / `data:` 字段、注释行和空行分帧。
//! `id:` 与 `retry:` 被忽略 (客户端不自动重连)。

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{BoxStream, Stream, StreamExt};
use shared::FeedEvent;

use crate::error::{ClientError, ClientResult};

/// 推送事件流
pub type FeedStream = BoxStream<'static, ClientResult<FeedEvent>>;

/// 一个完整的 SSE 帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// 增量 SSE 解码器
///
/// 按字节缓冲，避免多字节字符被分块截断。
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块数据，返回其中完成的帧
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// 把字节流解码为推送事件流
///
/// 未知事件被跳过；字节流出错时产出 [`ClientError::Transport`]。
pub fn decode_feed<S, B, E>(bytes: S) -> FeedStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let bytes: Pin<Box<S>> = Box::pin(bytes);
    let state = (bytes, SseDecoder::new(), VecDeque::new());

    futures::stream::unfold(state, |(mut bytes, mut decoder, mut ready)| async move {
        loop {
            if let Some(item) = ready.pop_front() {
                return Some((item, (bytes, decoder, ready)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in decoder.push(chunk.as_ref()) {
                        match FeedEvent::decode(&frame.event, &frame.data) {
                            Ok(Some(event)) => ready.push_back(Ok(event)),
                            Ok(None) => {
                                tracing::debug!(event = %frame.event, "Ignoring unknown feed event")
                            }
                            Err(e) => ready.push_back(Err(ClientError::from(e))),
                        }
                    }
                }
                Some(Err(e)) => {
                    return Some((
                        Err(ClientError::Transport(e.to_string())),
                        (bytes, decoder, ready),
                    ));
                }
                None => return None,
            }
        }
    })
    .boxed()
}
