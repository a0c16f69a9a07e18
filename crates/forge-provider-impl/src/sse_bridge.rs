use forge_protocol::sse::{SseEvent, SseParser};
use forge_provider_core::{CanonicalStream, StreamItem};
use serde_json::Value as JsonValue;

const CHANNEL_CAPACITY: usize = 32;

/// Drives an upstream SSE body through `translate`, forwarding canonical
/// chunks into a bounded channel that the downstream streaming bridge
/// consumes. `translate` receives one upstream SSE event's `data:` payload
/// and returns zero or more canonical (OpenAI-shaped) chunks; an `Err`
/// becomes the in-band stream error event (spec: post-commit failures are
/// surfaced inside the stream, never as an HTTP status change).
pub(crate) fn spawn_sse_bridge<F>(mut upstream: reqwest::Response, mut translate: F) -> CanonicalStream
where
    F: FnMut(&str) -> Result<Vec<JsonValue>, String> + Send + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut parser = SseParser::new();
        loop {
            let chunk = match upstream.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    let _ = tx
                        .send(StreamItem::Error {
                            message: err.to_string(),
                            code: "upstream_transport_error",
                        })
                        .await;
                    return;
                }
            };
            if !forward_events(parser.push_bytes(&chunk), &mut translate, &tx).await {
                return;
            }
        }
        forward_events(parser.finish(), &mut translate, &tx).await;
    });
    rx
}

async fn forward_events<F>(
    events: Vec<SseEvent>,
    translate: &mut F,
    tx: &tokio::sync::mpsc::Sender<StreamItem>,
) -> bool
where
    F: FnMut(&str) -> Result<Vec<JsonValue>, String>,
{
    for event in events {
        if event.data == "[DONE]" {
            continue;
        }
        match translate(&event.data) {
            Ok(chunks) => {
                for chunk in chunks {
                    if tx.send(StreamItem::Chunk(chunk)).await.is_err() {
                        return false;
                    }
                }
            }
            Err(message) => {
                let _ = tx
                    .send(StreamItem::Error {
                        message,
                        code: "upstream_stream_error",
                    })
                    .await;
                return false;
            }
        }
    }
    true
}
