//! Google Gemini (AI Studio) native adapter (spec §4.2 "Google Gemini
//! native"). Auth is a `?key=` query parameter rather than a header, and
//! the wire shape nests content under `contents`/`parts` with a
//! `generationConfig` object instead of top-level sampling fields.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use forge_provider_core::{
    CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult, UpstreamOutcome,
    UpstreamProvider,
};

use crate::client::shared_client;
use crate::sse_bridge::spawn_sse_bridge;

#[derive(Debug, Default)]
pub struct GeminiProvider;

impl GeminiProvider {
    pub fn new() -> Self {
        Self
    }
}

fn api_key(credential: &Credential) -> ProviderResult<&str> {
    match credential {
        Credential::ApiKey { api_key } => Ok(api_key.as_str()),
        _ => Err(ProviderError::InvalidSetup(
            "expected an api_key credential".to_string(),
        )),
    }
}

#[async_trait]
impl UpstreamProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_base_url(&self) -> &'static str {
        "https://generativelanguage.googleapis.com"
    }

    fn list_models_cache_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn list_models(
        &self,
        credential: &Credential,
        config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!(
            "{}/v1beta/models?key={}",
            base_url.trim_end_matches('/'),
            api_key(credential)?
        );
        let client = shared_client(None)?;
        let response = raise_for_status(client.get(&url).send().await?).await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("models")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|model| model.get("name").and_then(|n| n.as_str()))
            .map(|name| name.trim_start_matches("models/").to_string())
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
                "legacy text completions are not supported by the gemini adapter",
            ));
        };
        let is_stream = body.stream.unwrap_or(false);
        let model = config.remap_model(&body.model);
        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let key = api_key(credential)?;
        let native_body = openai_chat_to_gemini(&body, base_url, key).await?;

        let method = if is_stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let query = if is_stream { "alt=sse&" } else { "" };
        let url = format!(
            "{}/v1beta/models/{model}:{method}?{query}key={key}",
            base_url.trim_end_matches('/')
        );

        let client = shared_client(None)?;
        let response = raise_for_status(client.post(&url).json(&native_body).send().await?).await?;

        if is_stream {
            let model = model.clone();
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(
                response,
                move |data| gemini_stream_event_to_openai_chunks(data, &model),
            )))
        } else {
            let native: JsonValue = response.json().await?;
            Ok(UpstreamOutcome::Unary(gemini_response_to_openai(
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

/// Uploads an http(s) image to Gemini's resumable Files endpoint (spec §4.2
/// scenario 4): HEAD the source for content-type/length, POST to start a
/// resumable upload session, then stream the image bytes to the returned
/// upload URL. Returns `(mime_type, file_uri)` for a `file_data` part.
async fn upload_image_to_files_api(url: &str, base_url: &str, api_key: &str) -> ProviderResult<(String, String)> {
    let client = shared_client(None)?;

    let head = client.head(url).send().await?;
    let mime_type = head
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let content_length = head
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0")
        .to_string();

    let upload_base = format!("{}/upload/v1beta/files", base_url.trim_end_matches('/'));
    let start = client
        .post(format!("{upload_base}?key={api_key}"))
        .header("X-Goog-Upload-Protocol", "resumable")
        .header("X-Goog-Upload-Command", "start")
        .header("X-Goog-Upload-Header-Content-Length", &content_length)
        .header("X-Goog-Upload-Header-Content-Type", &mime_type)
        .json(&serde_json::json!({ "file": { "display_name": "upload" } }))
        .send()
        .await?;
    let start = raise_for_status(start).await?;
    let upload_url = start
        .headers()
        .get("x-goog-upload-url")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProviderError::UpstreamApiError {
            status: 502,
            message: "gemini files upload did not return an upload URL".to_string(),
        })?
        .to_string();

    let source = raise_for_status(client.get(url).send().await?).await?;
    let bytes = source.bytes().await?;

    let uploaded = client
        .put(&upload_url)
        .header("Content-Length", content_length)
        .header("X-Goog-Upload-Offset", "0")
        .header("X-Goog-Upload-Command", "upload, finalize")
        .body(bytes)
        .send()
        .await?;
    let uploaded = raise_for_status(uploaded).await?;
    let body: JsonValue = uploaded.json().await?;
    let uri = body
        .pointer("/file/uri")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let mime_type = body
        .pointer("/file/mimeType")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(mime_type);
    Ok((mime_type, uri))
}

/// Translates one canonical content part into a Gemini `parts[]` entry.
/// `data:` image URLs become `inline_data`; http(s) URLs are uploaded to the
/// Files API first and referenced as `file_data` (spec §4.2).
async fn content_part_to_gemini(part: &JsonValue, base_url: &str, api_key: &str) -> ProviderResult<JsonValue> {
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
                let mime_type = header.split(';').next().unwrap_or("application/octet-stream");
                Ok(serde_json::json!({
                    "inline_data": { "mime_type": mime_type, "data": data },
                }))
            } else {
                let (mime_type, file_uri) = upload_image_to_files_api(url, base_url, api_key).await?;
                Ok(serde_json::json!({
                    "file_data": { "mime_type": mime_type, "file_uri": file_uri },
                }))
            }
        }
        _ => Ok(serde_json::json!({ "text": "" })),
    }
}

async fn content_to_gemini_parts(content: &JsonValue, base_url: &str, api_key: &str) -> ProviderResult<Vec<JsonValue>> {
    match content {
        JsonValue::String(text) => Ok(vec![serde_json::json!({ "text": text })]),
        JsonValue::Array(parts) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                out.push(content_part_to_gemini(part, base_url, api_key).await?);
            }
            Ok(out)
        }
        _ => Ok(Vec::new()),
    }
}

async fn openai_chat_to_gemini(
    body: &forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody,
    base_url: &str,
    api_key: &str,
) -> ProviderResult<JsonValue> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &body.messages {
        let value = serde_json::to_value(message)
            .map_err(|err| ProviderError::Other(err.to_string()))?;
        let role = value.get("role").and_then(|v| v.as_str()).unwrap_or("");
        let content = value.get("content").cloned().unwrap_or(JsonValue::Null);

        if role == "system" || role == "developer" {
            if let Some(text) = content.as_str().filter(|t| !t.is_empty()) {
                system_parts.push(text.to_string());
            }
            continue;
        }

        let gemini_role = if role == "assistant" { "model" } else { "user" };
        let parts = content_to_gemini_parts(&content, base_url, api_key).await?;
        contents.push(serde_json::json!({ "role": gemini_role, "parts": parts }));
    }

    let mut generation_config = Map::new();
    if let Some(temperature) = body.temperature {
        generation_config.insert("temperature".to_string(), JsonValue::from(temperature));
    }
    if let Some(top_p) = body.top_p {
        generation_config.insert("topP".to_string(), JsonValue::from(top_p));
    }
    if let Some(max_tokens) = body.max_completion_tokens.or(body.max_tokens) {
        generation_config.insert("maxOutputTokens".to_string(), JsonValue::from(max_tokens));
    }
    if let Some(stop) = &body.stop {
        use forge_protocol::openai::chat_completions::request::StopConfiguration;
        let stop_sequences = match stop {
            StopConfiguration::Single(s) => vec![s.clone()],
            StopConfiguration::Many(many) => many.clone(),
        };
        if !stop_sequences.is_empty() {
            generation_config.insert("stopSequences".to_string(), JsonValue::from(stop_sequences));
        }
    }

    let mut out = Map::new();
    out.insert("contents".to_string(), JsonValue::Array(contents));
    if !system_parts.is_empty() {
        out.insert(
            "systemInstruction".to_string(),
            serde_json::json!({ "parts": [{ "text": system_parts.join("\n\n") }] }),
        );
    }
    if !generation_config.is_empty() {
        out.insert(
            "generationConfig".to_string(),
            JsonValue::Object(generation_config),
        );
    }
    Ok(JsonValue::Object(out))
}

fn gemini_finish_reason(native: &str) -> &'static str {
    match native {
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" => "content_filter",
        _ => "stop",
    }
}

/// Translates `usageMetadata` into canonical usage, including the nested
/// `cached_tokens`/`reasoning_tokens` detail fields the streaming bridge and
/// usage tracker read (spec §4.2: `cachedContentTokenCount`,
/// `thoughtsTokenCount`).
fn gemini_usage_to_openai(usage: &JsonValue) -> JsonValue {
    let prompt = usage.get("promptTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let completion = usage
        .get("candidatesTokenCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let total = usage
        .get("totalTokenCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(prompt + completion);
    let cached_tokens = usage.get("cachedContentTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let reasoning_tokens = usage.get("thoughtsTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    serde_json::json!({
        "prompt_tokens": prompt,
        "completion_tokens": completion,
        "total_tokens": total,
        "prompt_tokens_details": { "cached_tokens": cached_tokens },
        "completion_tokens_details": { "reasoning_tokens": reasoning_tokens },
    })
}

fn gemini_response_to_openai(native: &JsonValue, model: &str) -> JsonValue {
    let candidate = native.pointer("/candidates/0");
    let text = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|v| v.as_str())
        .map(gemini_finish_reason)
        .unwrap_or("stop");
    let usage = native
        .get("usageMetadata")
        .map(gemini_usage_to_openai)
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

/// Translates one already-parsed Gemini stream object into a canonical
/// chunk. The real API is driven in SSE (`alt=sse`) framing, so each `data:`
/// payload is already one complete top-level JSON object — equivalent in
/// effect to the raw mode's "scan for complete top-level JSON objects"
/// parsing, without hand-rolling a streaming JSON scanner (see DESIGN.md).
fn gemini_stream_event_to_openai_chunks(data: &str, model: &str) -> Result<Vec<JsonValue>, String> {
    let event: JsonValue = serde_json::from_str(data).map_err(|err| err.to_string())?;
    let candidate = event.pointer("/candidates/0");
    let text = candidate
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let finish_reason = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|v| v.as_str())
        .map(gemini_finish_reason);
    let usage = event.get("usageMetadata").map(gemini_usage_to_openai);

    if text.is_empty() && finish_reason.is_none() && usage.is_none() {
        return Ok(Vec::new());
    }
    Ok(vec![serde_json::json!({
        "id": "",
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{
            "index": 0,
            "delta": { "content": text },
            "finish_reason": finish_reason,
        }],
        "usage": usage,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_event_translates_text_delta() {
        let chunks = gemini_stream_event_to_openai_chunks(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#,
            "gemini-1.5-pro",
        )
        .unwrap();
        assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "hi");
    }

    #[test]
    fn usage_translates_cached_and_reasoning_tokens() {
        let usage = gemini_usage_to_openai(&serde_json::json!({
            "promptTokenCount": 100,
            "candidatesTokenCount": 20,
            "cachedContentTokenCount": 30,
            "thoughtsTokenCount": 5,
        }));
        assert_eq!(usage["prompt_tokens_details"]["cached_tokens"], 30);
        assert_eq!(usage["completion_tokens_details"]["reasoning_tokens"], 5);
    }

    #[tokio::test]
    async fn data_url_image_part_becomes_inline_data() {
        let part = serde_json::json!({
            "type": "image_url",
            "image_url": { "url": "data:image/png;base64,iVBORw0KG==" },
        });
        let gemini_part = content_part_to_gemini(&part, "https://generativelanguage.googleapis.com", "key")
            .await
            .unwrap();
        assert_eq!(gemini_part["inline_data"]["mime_type"], "image/png");
        assert_eq!(gemini_part["inline_data"]["data"], "iVBORw0KG==");
    }
}
