//! AWS Bedrock Converse API adapter (spec §4.2 "AWS Bedrock Converse").
//! Requests are signed with SigV4 instead of carrying a bearer token, and
//! streaming responses arrive as `application/vnd.amazon.eventstream`
//! binary frames rather than SSE text.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{Map, Value as JsonValue};

use forge_provider_core::{
    CanonicalStream, CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult,
    StreamItem, UpstreamOutcome, UpstreamProvider,
};

use crate::client::shared_client;
use crate::sigv4;

#[derive(Debug, Default)]
pub struct BedrockProvider;

impl BedrockProvider {
    pub fn new() -> Self {
        Self
    }
}

struct BedrockCredential<'a> {
    region: &'a str,
    access_key_id: &'a str,
    secret_access_key: &'a str,
}

fn bedrock_credential(credential: &Credential) -> ProviderResult<BedrockCredential<'_>> {
    match credential {
        Credential::Bedrock {
            region,
            access_key_id,
            secret_access_key,
        } => Ok(BedrockCredential {
            region,
            access_key_id,
            secret_access_key,
        }),
        _ => Err(ProviderError::InvalidSetup(
            "expected an aws bedrock credential".to_string(),
        )),
    }
}

#[async_trait]
impl UpstreamProvider for BedrockProvider {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn default_base_url(&self) -> &'static str {
        "https://bedrock-runtime.us-east-1.amazonaws.com"
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let cred = bedrock_credential(credential)?;
        let host = format!("bedrock.{}.amazonaws.com", cred.region);
        let path = "/foundation-models";
        let signed = sigv4::sign_post(
            cred.region,
            "bedrock",
            cred.access_key_id,
            cred.secret_access_key,
            &host,
            path,
            b"",
        );
        let url = format!("https://{host}{path}");
        let client = shared_client(None)?;
        let mut request = client.get(&url);
        for (name, value) in &signed.headers {
            if name == "x-amz-content-sha256" {
                continue;
            }
            request = request.header(name, value);
        }
        let response = raise_for_status(request.send().await?).await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("modelSummaries")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|model| model.get("modelId").and_then(|id| id.as_str()))
            .map(str::to_string)
            .collect();
        Ok(models)
    }

    async fn process_completion(
        &self,
        request: CompletionRequest,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<UpstreamOutcome> {
        let CompletionRequest::Chat(body) = request else {
            return Err(ProviderError::NotImplemented(
                "legacy text completions are not supported by the bedrock adapter",
            ));
        };
        let is_stream = body.stream.unwrap_or(false);
        let model = config.remap_model(&body.model);
        let client = shared_client(None)?;
        let native_body = openai_chat_to_converse(&body, &client).await?;
        let payload =
            serde_json::to_vec(&native_body).map_err(|err| ProviderError::Other(err.to_string()))?;

        let cred = bedrock_credential(credential)?;
        let host = format!("bedrock-runtime.{}.amazonaws.com", cred.region);
        let operation = if is_stream {
            "converse-stream"
        } else {
            "converse"
        };
        let path = format!("/model/{model}/{operation}");
        let signed = sigv4::sign_post(
            cred.region,
            "bedrock",
            cred.access_key_id,
            cred.secret_access_key,
            &host,
            &path,
            &payload,
        );
        let url = format!("https://{host}{path}");

        let mut request = client.post(&url).body(payload);
        for (name, value) in &signed.headers {
            request = request.header(name, value);
        }
        let response = raise_for_status(request.send().await?).await?;

        if is_stream {
            Ok(UpstreamOutcome::Stream(spawn_eventstream_bridge(
                response, model,
            )))
        } else {
            let native: JsonValue = response.json().await?;
            Ok(UpstreamOutcome::Unary(converse_response_to_openai(
                &native, &model,
            )))
        }
    }
}

async fn raise_for_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::UpstreamApiError {
        status: status.as_u16(),
        message,
    })
}

/// Translates one canonical content part into a Converse content block.
/// `data:` image URLs are inlined as-is (already base64); http(s) URLs are
/// downloaded and re-encoded, with the format taken from the response's
/// `content-type` (spec §4.2 "Bedrock Converse").
async fn content_part_to_converse(part: &JsonValue, client: &reqwest::Client) -> ProviderResult<JsonValue> {
    match part.get("type").and_then(|v| v.as_str()) {
        Some("text") => Ok(serde_json::json!({
            "text": part.get("text").and_then(|v| v.as_str()).unwrap_or(""),
        })),
        Some("image_url") => {
            let url = part
                .pointer("/image_url/url")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if let Some(rest) = url.strip_prefix("data:") {
                let (header, data) = rest.split_once(',').unwrap_or(("", ""));
                let media_type = header.split(';').next().unwrap_or("image/png");
                Ok(serde_json::json!({
                    "image": {
                        "format": converse_image_format(media_type),
                        "source": { "bytes": data },
                    },
                }))
            } else {
                let response = raise_for_status(client.get(url).send().await?).await?;
                let media_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("image/png")
                    .to_string();
                let bytes = response.bytes().await?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Ok(serde_json::json!({
                    "image": {
                        "format": converse_image_format(&media_type),
                        "source": { "bytes": encoded },
                    },
                }))
            }
        }
        _ => Ok(serde_json::json!({ "text": "" })),
    }
}

fn converse_image_format(media_type: &str) -> &'static str {
    match media_type.split('/').nth(1).unwrap_or("") {
        "jpeg" | "jpg" => "jpeg",
        "gif" => "gif",
        "webp" => "webp",
        _ => "png",
    }
}

async fn content_to_converse_blocks(content: &JsonValue, client: &reqwest::Client) -> ProviderResult<Vec<JsonValue>> {
    match content {
        JsonValue::String(text) => Ok(vec![serde_json::json!({ "text": text })]),
        JsonValue::Array(parts) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                out.push(content_part_to_converse(part, client).await?);
            }
            Ok(out)
        }
        _ => Ok(Vec::new()),
    }
}

async fn openai_chat_to_converse(
    body: &forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody,
    client: &reqwest::Client,
) -> ProviderResult<JsonValue> {
    let mut system = Vec::new();
    let mut messages = Vec::new();

    for message in &body.messages {
        let value = serde_json::to_value(message)
            .map_err(|err| ProviderError::Other(err.to_string()))?;
        let role = value.get("role").and_then(|v| v.as_str()).unwrap_or("");
        let content = value.get("content").cloned().unwrap_or(JsonValue::Null);

        if role == "system" || role == "developer" {
            if let Some(text) = content.as_str().filter(|t| !t.is_empty()) {
                system.push(serde_json::json!({ "text": text }));
            }
            continue;
        }
        let converse_role = if role == "assistant" { "assistant" } else { "user" };
        let blocks = content_to_converse_blocks(&content, client).await?;
        messages.push(serde_json::json!({
            "role": converse_role,
            "content": blocks,
        }));
    }

    let mut inference_config = Map::new();
    if let Some(max_tokens) = body.max_completion_tokens.or(body.max_tokens) {
        inference_config.insert("maxTokens".to_string(), JsonValue::from(max_tokens));
    }
    if let Some(temperature) = body.temperature {
        inference_config.insert("temperature".to_string(), JsonValue::from(temperature));
    }
    if let Some(top_p) = body.top_p {
        inference_config.insert("topP".to_string(), JsonValue::from(top_p));
    }

    let mut out = Map::new();
    out.insert("messages".to_string(), JsonValue::Array(messages));
    if !system.is_empty() {
        out.insert("system".to_string(), JsonValue::Array(system));
    }
    if !inference_config.is_empty() {
        out.insert(
            "inferenceConfig".to_string(),
            JsonValue::Object(inference_config),
        );
    }
    Ok(JsonValue::Object(out))
}

fn converse_stop_reason_to_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        Some("content_filtered") => "content_filter",
        _ => "stop",
    }
}

fn converse_usage_to_openai(usage: &JsonValue) -> JsonValue {
    let input = usage.get("inputTokens").and_then(|v| v.as_i64()).unwrap_or(0);
    let output = usage.get("outputTokens").and_then(|v| v.as_i64()).unwrap_or(0);
    let total = usage
        .get("totalTokens")
        .and_then(|v| v.as_i64())
        .unwrap_or(input + output);
    serde_json::json!({
        "prompt_tokens": input,
        "completion_tokens": output,
        "total_tokens": total,
    })
}

fn converse_response_to_openai(native: &JsonValue, model: &str) -> JsonValue {
    let text = native
        .pointer("/output/message/content")
        .and_then(|v| v.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let finish_reason = converse_stop_reason_to_finish_reason(
        native.get("stopReason").and_then(|v| v.as_str()),
    );
    let usage = native
        .get("usage")
        .map(converse_usage_to_openai)
        .unwrap_or(JsonValue::Null);

    serde_json::json!({
        "id": "",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": finish_reason,
        }],
        "usage": usage,
    })
}

/// Converts one decoded `ConverseStream` event payload into canonical
/// chunks. `contentBlockDelta`/`messageStop`/`metadata` are the only event
/// types that carry text, a finish reason, or usage.
fn converse_event_to_openai_chunk(event: &JsonValue, model: &str) -> Option<JsonValue> {
    if let Some(text) = event.pointer("/delta/text").and_then(|v| v.as_str()) {
        if text.is_empty() {
            return None;
        }
        return Some(serde_json::json!({
            "id": "",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{
                "index": 0,
                "delta": { "content": text },
                "finish_reason": JsonValue::Null,
            }],
        }));
    }
    if let Some(reason) = event.get("stopReason").and_then(|v| v.as_str()) {
        return Some(serde_json::json!({
            "id": "",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{
                "index": 0,
                "delta": {},
                "finish_reason": converse_stop_reason_to_finish_reason(Some(reason)),
            }],
        }));
    }
    if let Some(usage) = event.get("usage") {
        return Some(serde_json::json!({
            "id": "",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{ "index": 0, "delta": {}, "finish_reason": JsonValue::Null }],
            "usage": converse_usage_to_openai(usage),
        }));
    }
    None
}

/// Drives the `vnd.amazon.eventstream` binary framing used by
/// `converse-stream`: each frame has a fixed 12-byte prelude (total
/// length, header length, prelude CRC), headers, a JSON payload, and a
/// trailing message CRC. Only the payload is needed here.
fn spawn_eventstream_bridge(mut response: reqwest::Response, model: String) -> CanonicalStream {
    let (tx, rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(async move {
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
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
            }
            while let Some((payload, consumed)) = decode_next_frame(&buffer) {
                buffer.drain(..consumed);
                if let Ok(event) = serde_json::from_slice::<JsonValue>(&payload)
                    && let Some(chunk) = converse_event_to_openai_chunk(&event, &model)
                    && tx.send(StreamItem::Chunk(chunk)).await.is_err()
                {
                    return;
                }
            }
        }
    });
    rx
}

/// Returns `(payload_bytes, total_frame_len)` for the first complete frame
/// in `buffer`, or `None` if more bytes are needed.
fn decode_next_frame(buffer: &[u8]) -> Option<(Vec<u8>, usize)> {
    if buffer.len() < 12 {
        return None;
    }
    let total_len = u32::from_be_bytes(buffer[0..4].try_into().ok()?) as usize;
    let header_len = u32::from_be_bytes(buffer[4..8].try_into().ok()?) as usize;
    if buffer.len() < total_len {
        return None;
    }
    let payload_start = 12 + header_len;
    let payload_end = total_len.saturating_sub(4); // trailing 4-byte message CRC
    if payload_end < payload_start || payload_end > buffer.len() {
        return Some((Vec::new(), total_len));
    }
    Some((buffer[payload_start..payload_end].to_vec(), total_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn data_url_image_becomes_inline_bytes() {
        let client = reqwest::Client::new();
        let part = serde_json::json!({
            "type": "image_url",
            "image_url": { "url": "data:image/png;base64,iVBORw0KG==" },
        });
        let block = content_part_to_converse(&part, &client).await.unwrap();
        assert_eq!(block["image"]["format"], "png");
        assert_eq!(block["image"]["source"]["bytes"], "iVBORw0KG==");
    }

    #[tokio::test]
    async fn text_part_passes_through() {
        let client = reqwest::Client::new();
        let part = serde_json::json!({ "type": "text", "text": "hello" });
        let block = content_part_to_converse(&part, &client).await.unwrap();
        assert_eq!(block["text"], "hello");
    }

    #[test]
    fn converse_image_format_maps_jpeg_and_defaults_to_png() {
        assert_eq!(converse_image_format("image/jpeg"), "jpeg");
        assert_eq!(converse_image_format("image/jpg"), "jpeg");
        assert_eq!(converse_image_format("image/gif"), "gif");
        assert_eq!(converse_image_format("image/webp"), "webp");
        assert_eq!(converse_image_format("image/bogus"), "png");
    }

    #[tokio::test]
    async fn string_content_becomes_single_text_block() {
        let client = reqwest::Client::new();
        let blocks = content_to_converse_blocks(&JsonValue::String("hi".to_string()), &client)
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["text"], "hi");
    }
}
