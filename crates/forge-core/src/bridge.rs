//! The streaming bridge (spec §4.3): turns a `CanonicalStream` of
//! already-translated OpenAI-shaped chunks into an `text/event-stream`
//! HTTP response.
//!
//! Pre-commit failures (the provider errors out before sending anything)
//! surface as an ordinary HTTP error, since no status has been committed
//! yet. Once the first chunk is pulled, the response is committed and any
//! later failure is rendered in-band as a `stream_error` SSE event followed
//! by `[DONE]` — the HTTP status can no longer change. Usage is finalized
//! by a detached task that owns the upstream channel directly, so it keeps
//! draining and closes the usage row even if the downstream client hangs
//! up mid-stream.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use forge_provider_core::{CanonicalStream, StreamItem};
use forge_storage::{Store, UsageCompletion};
use serde_json::Value as JsonValue;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::GatewayError;
use crate::usage;

const OUTBOUND_CAPACITY: usize = 32;

/// Consumes the first item off `upstream` and, if it's a chunk, commits a
/// streaming response; spawns the detached forward+finalize task for the
/// rest. `approx_input_chars` seeds the input-token estimate used when the
/// provider never reports `usage.prompt_tokens` (spec §4.3).
pub async fn stream_response(
    store: Arc<dyn Store>,
    usage_id: i64,
    mut upstream: CanonicalStream,
    approx_input_chars: usize,
) -> Result<Response, GatewayError> {
    let first = match upstream.recv().await {
        None => {
            return Err(GatewayError::ProviderApiError {
                status: 502,
                message: "upstream closed before sending any data".to_string(),
            });
        }
        Some(StreamItem::Error { message, code }) => {
            return Err(GatewayError::ProviderApiError {
                status: 502,
                message: format!("{code}: {message}"),
            });
        }
        Some(StreamItem::Chunk(json)) => json,
    };

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(OUTBOUND_CAPACITY);

    tokio::spawn(async move {
        let mut acc = UsageAccumulator::default();
        acc.accumulate(&first);
        let _ = tx.send(Ok(encode_chunk(&first))).await;

        loop {
            match upstream.recv().await {
                None => break,
                Some(StreamItem::Chunk(json)) => {
                    acc.accumulate(&json);
                    let _ = tx.send(Ok(encode_chunk(&json))).await;
                }
                Some(StreamItem::Error { message, code: _ }) => {
                    let _ = tx.send(Ok(encode_error(&message))).await;
                    break;
                }
            }
        }
        let _ = tx.send(Ok(Bytes::from_static(b"data: [DONE]\n\n"))).await;

        let completion = acc.finish(approx_input_chars);
        usage::finalize_detached(store, usage_id, completion);
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

fn encode_chunk(json: &JsonValue) -> Bytes {
    Bytes::from(format!("data: {json}\n\n"))
}

/// Post-commit in-band stream error (spec §4.3, scenario 6): the status
/// line is already committed, so the failure is rendered as an SSE event
/// with a fixed `code` regardless of which internal reason produced it.
fn encode_error(message: &str) -> Bytes {
    let body = serde_json::json!({
        "error": { "message": message, "type": "stream_error", "code": "provider_error" }
    });
    Bytes::from(format!("data: {body}\n\n"))
}

#[derive(Default)]
struct UsageAccumulator {
    approx_output_chars: usize,
    reported_input: Option<i64>,
    reported_output: Option<i64>,
    reported_total: Option<i64>,
    cached_tokens: Option<i64>,
    reasoning_tokens: Option<i64>,
}

impl UsageAccumulator {
    fn accumulate(&mut self, chunk: &JsonValue) {
        self.approx_output_chars += delta_text_len(chunk);

        let Some(usage) = chunk.get("usage") else { return };
        if let Some(v) = usage.get("prompt_tokens").and_then(JsonValue::as_i64) {
            self.reported_input = Some(v);
        }
        if let Some(v) = usage.get("completion_tokens").and_then(JsonValue::as_i64) {
            self.reported_output = Some(v);
        }
        if let Some(v) = usage.get("total_tokens").and_then(JsonValue::as_i64) {
            self.reported_total = Some(v);
        }
        if let Some(v) = usage
            .get("prompt_tokens_details")
            .and_then(|d| d.get("cached_tokens"))
            .and_then(JsonValue::as_i64)
        {
            self.cached_tokens = Some(v);
        }
        if let Some(v) = usage
            .get("completion_tokens_details")
            .and_then(|d| d.get("reasoning_tokens"))
            .and_then(JsonValue::as_i64)
        {
            self.reasoning_tokens = Some(v);
        }
    }

    fn finish(self, approx_input_chars: usize) -> UsageCompletion {
        let output_tokens = match (self.reported_output, self.reported_total, self.reported_input) {
            (Some(reported), Some(total), Some(input)) => Some(reported.max(total - input)),
            (Some(reported), _, _) => Some(reported),
            (None, Some(total), Some(input)) => Some((total - input).max(0)),
            (None, _, _) => Some((self.approx_output_chars / 4) as i64),
        };
        let input_tokens = self
            .reported_input
            .or(Some((approx_input_chars / 4) as i64));

        UsageCompletion {
            input_tokens,
            output_tokens,
            cached_tokens: self.cached_tokens,
            reasoning_tokens: self.reasoning_tokens,
            cost: None,
        }
    }
}

fn delta_text_len(chunk: &JsonValue) -> usize {
    chunk
        .get("choices")
        .and_then(JsonValue::as_array)
        .map(|choices| {
            choices
                .iter()
                .filter_map(|choice| choice.get("delta")?.get("content")?.as_str())
                .map(str::len)
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_reported_max_over_total_minus_input() {
        let mut acc = UsageAccumulator::default();
        acc.reported_input = Some(10);
        acc.reported_output = Some(5);
        acc.reported_total = Some(20);
        let completion = acc.finish(0);
        assert_eq!(completion.output_tokens, Some(10));
    }

    #[test]
    fn falls_back_to_char_approximation_when_unreported() {
        let mut acc = UsageAccumulator::default();
        acc.approx_output_chars = 40;
        let completion = acc.finish(16);
        assert_eq!(completion.output_tokens, Some(10));
        assert_eq!(completion.input_tokens, Some(4));
    }
}
