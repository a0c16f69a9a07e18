//! Anthropic Messages API adapter (spec §4.2 "Anthropic"). The canonical
//! request (OpenAI chat-completions shape) and Anthropic's native
//! `/v1/messages` shape disagree on where the system prompt lives, how
//! tool calls are represented, and how streaming deltas are framed, so this
//! adapter does real translation instead of the near-identity pass-through
//! the OpenAI family uses.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use forge_provider_core::{
    CompletionRequest, Credential, ProviderConfig, ProviderError, ProviderResult, UpstreamOutcome,
    UpstreamProvider,
};

use crate::client::shared_client;
use crate::sse_bridge::spawn_sse_bridge;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: i64 = 4096;
/// Spec §4.2/§9: a conservative guard carried over from the original
/// implementation, not a protocol requirement. Anything above this is
/// capped and logged rather than forwarded.
const MAX_TOKENS_CAP: i64 = 16384;

#[derive(Debug, Default)]
pub struct AnthropicProvider;

impl AnthropicProvider {
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
impl UpstreamProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.anthropic.com"
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
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let request = apply_auth(client.get(&url), api_key(credential)?);
        let response = raise_for_status(request.send().await?).await?;
        let body: JsonValue = response.json().await?;
        let models = body
            .get("data")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|model| model.get("id").and_then(|id| id.as_str()))
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
                "legacy text completions are not supported by the anthropic adapter",
            ));
        };
        let is_stream = body.stream.unwrap_or(false);
        let model = config.remap_model(&body.model);
        let native_body = openai_chat_to_anthropic(&body, &model)?;

        let base_url = config.base_url.as_deref().unwrap_or(self.default_base_url());
        let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        let client = shared_client(None)?;
        let request = apply_auth(client.post(&url).json(&native_body), api_key(credential)?);
        let response = raise_for_status(request.send().await?).await?;

        if is_stream {
            let model = model.clone();
            let mut state = AnthropicStreamState::new(model);
            Ok(UpstreamOutcome::Stream(spawn_sse_bridge(
                response,
                move |data| state.translate_event(data),
            )))
        } else {
            let native: JsonValue = response.json().await?;
            Ok(UpstreamOutcome::Unary(anthropic_message_to_openai(
                &native, &model,
            )))
        }
    }
}

fn apply_auth(request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
    request
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
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

/// Translates one canonical content part (`{type:"text"|"image_url", ...}`)
/// into its Anthropic block. An `image_url` with a `data:` URL becomes a
/// base64 source; an http(s) URL becomes a `url` source (spec §4.2).
fn content_part_to_anthropic(part: &JsonValue) -> JsonValue {
    match part.get("type").and_then(|v| v.as_str()) {
        Some("text") => serde_json::json!({
            "type": "text",
            "text": part.get("text").and_then(|v| v.as_str()).unwrap_or(""),
        }),
        Some("image_url") => {
            let url = part
                .pointer("/image_url/url")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if let Some(rest) = url.strip_prefix("data:") {
                let (header, data) = rest.split_once(',').unwrap_or(("", ""));
                let media_type = header.split(';').next().unwrap_or("application/octet-stream");
                serde_json::json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": media_type, "data": data },
                })
            } else {
                serde_json::json!({
                    "type": "image",
                    "source": { "type": "url", "url": url },
                })
            }
        }
        _ => serde_json::json!({ "type": "text", "text": "" }),
    }
}

/// Translates a canonical `content` field (string, null, or parts array)
/// into an Anthropic content value.
fn content_to_anthropic(content: &JsonValue) -> JsonValue {
    match content {
        JsonValue::String(_) | JsonValue::Null => content.clone(),
        JsonValue::Array(parts) => {
            JsonValue::Array(parts.iter().map(content_part_to_anthropic).collect())
        }
        other => other.clone(),
    }
}

/// Anthropic keeps system text out of `messages`, requires `max_tokens`,
/// represents tool calls as `tool_use` content blocks, and represents tool
/// results as a `tool_result` block inside a user message — everything else
/// maps close to one-for-one (spec §4.2).
pub(crate) fn openai_chat_to_anthropic(
    body: &forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody,
    model: &str,
) -> ProviderResult<JsonValue> {
    let mut system_texts = Vec::new();
    let mut messages = Vec::new();

    for message in &body.messages {
        let value = serde_json::to_value(message)
            .map_err(|err| ProviderError::Other(err.to_string()))?;
        let role = value.get("role").and_then(|v| v.as_str()).unwrap_or("");
        let content = value.get("content").cloned().unwrap_or(JsonValue::Null);

        match role {
            "system" | "developer" => {
                match &content {
                    JsonValue::String(text) => system_texts.push(text.clone()),
                    JsonValue::Array(parts) => {
                        let text = parts
                            .iter()
                            .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some("text"))
                            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                            .collect::<Vec<_>>()
                            .join("\n");
                        if !text.is_empty() {
                            system_texts.push(text);
                        }
                    }
                    _ => {}
                }
            }
            "tool" => {
                let tool_call_id = value
                    .get("tool_call_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let text = match &content {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                messages.push(serde_json::json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": text,
                    }],
                }));
            }
            "assistant" => {
                let mut blocks = Vec::new();
                match &content {
                    JsonValue::Null => {}
                    JsonValue::String(text) if !text.is_empty() => {
                        blocks.push(serde_json::json!({ "type": "text", "text": text }));
                    }
                    JsonValue::Array(parts) => {
                        for part in parts {
                            blocks.push(content_part_to_anthropic(part));
                        }
                    }
                    _ => {}
                }
                if let Some(tool_calls) = value.get("tool_calls").and_then(|v| v.as_array()) {
                    for call in tool_calls {
                        let id = call.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        let name = call
                            .pointer("/function/name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string();
                        let args_str = call
                            .pointer("/function/arguments")
                            .and_then(|v| v.as_str())
                            .unwrap_or("{}");
                        let input: JsonValue = serde_json::from_str(args_str).unwrap_or_else(|_| {
                            tracing::warn!(%id, "anthropic adapter: tool call arguments were not valid JSON");
                            serde_json::json!({})
                        });
                        blocks.push(serde_json::json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": input,
                        }));
                    }
                }
                messages.push(serde_json::json!({ "role": "assistant", "content": blocks }));
            }
            _ => {
                messages.push(serde_json::json!({
                    "role": "user",
                    "content": content_to_anthropic(&content),
                }));
            }
        }
    }

    let mut out = Map::new();
    out.insert("model".to_string(), JsonValue::String(model.to_string()));
    out.insert("messages".to_string(), JsonValue::Array(messages));

    let requested_max_tokens = body
        .max_completion_tokens
        .or(body.max_tokens)
        .unwrap_or(DEFAULT_MAX_TOKENS);
    let max_tokens = if requested_max_tokens > MAX_TOKENS_CAP {
        tracing::warn!(
            requested = requested_max_tokens,
            cap = MAX_TOKENS_CAP,
            "anthropic adapter: max_tokens exceeded the compatibility cap, clamping"
        );
        MAX_TOKENS_CAP
    } else {
        requested_max_tokens
    };
    out.insert("max_tokens".to_string(), JsonValue::from(max_tokens));

    if !system_texts.is_empty() {
        out.insert(
            "system".to_string(),
            JsonValue::String(system_texts.join("\n\n")),
        );
    }
    if let Some(temperature) = body.temperature {
        out.insert("temperature".to_string(), JsonValue::from(temperature));
    }
    if let Some(top_p) = body.top_p {
        out.insert("top_p".to_string(), JsonValue::from(top_p));
    }
    if body.stream.unwrap_or(false) {
        out.insert("stream".to_string(), JsonValue::Bool(true));
    }
    if let Some(tools) = body.tools.as_ref().filter(|tools| !tools.is_empty()) {
        let anthropic_tools: Vec<JsonValue> = tools
            .iter()
            .filter_map(|tool| {
                let value = serde_json::to_value(tool).ok()?;
                let function = value.get("function")?;
                Some(serde_json::json!({
                    "name": function.get("name").cloned().unwrap_or(JsonValue::Null),
                    "description": function.get("description").cloned().unwrap_or(JsonValue::Null),
                    "input_schema": function
                        .get("parameters")
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
                }))
            })
            .collect();
        if !anthropic_tools.is_empty() {
            out.insert("tools".to_string(), JsonValue::Array(anthropic_tools));
        }
    }
    Ok(JsonValue::Object(out))
}

fn anthropic_stop_reason_to_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("end_turn") | Some("stop_sequence") => "stop",
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        _ => "stop",
    }
}

fn anthropic_usage_to_openai(usage: &JsonValue) -> JsonValue {
    let input = usage.get("input_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
    let output = usage.get("output_tokens").and_then(|v| v.as_i64()).unwrap_or(0);
    serde_json::json!({
        "prompt_tokens": input,
        "completion_tokens": output,
        "total_tokens": input + output,
    })
}

/// Builds `choices[0].message` from Anthropic's content blocks: concatenated
/// text plus a `tool_calls` array rebuilt from `tool_use` blocks with
/// `arguments` re-serialized from `input` (spec §4.2, round-trip law
/// "preserves ... tool-use ids").
pub(crate) fn anthropic_message_to_openai(native: &JsonValue, model: &str) -> JsonValue {
    let blocks = native.get("content").and_then(|v| v.as_array());

    let text = blocks
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let tool_calls: Vec<JsonValue> = blocks
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
                .map(|block| {
                    let arguments = block
                        .get("input")
                        .cloned()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "{}".to_string());
                    serde_json::json!({
                        "id": block.get("id").cloned().unwrap_or(JsonValue::Null),
                        "type": "function",
                        "function": {
                            "name": block.get("name").cloned().unwrap_or(JsonValue::Null),
                            "arguments": arguments,
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason =
        anthropic_stop_reason_to_finish_reason(native.get("stop_reason").and_then(|v| v.as_str()));
    let usage = native
        .get("usage")
        .map(anthropic_usage_to_openai)
        .unwrap_or(JsonValue::Null);

    let mut message = serde_json::json!({
        "role": "assistant",
        "content": if text.is_empty() && !tool_calls.is_empty() { JsonValue::Null } else { JsonValue::String(text) },
    });
    if !tool_calls.is_empty() {
        message["tool_calls"] = JsonValue::Array(tool_calls);
    }

    serde_json::json!({
        "id": native.get("id").cloned().unwrap_or(JsonValue::Null),
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason,
        }],
        "usage": usage,
    })
}

#[derive(Clone, Copy)]
enum BlockKind {
    Text,
    ToolUse { tool_call_index: usize },
}

/// Per-stream state for translating Anthropic SSE events into canonical
/// chunks (spec §4.2 "Streaming"). One instance is created per request and
/// driven event-by-event by [`spawn_sse_bridge`]. Reused as-is by the Vertex
/// adapter, which speaks the identical Anthropic wire shape over
/// `streamRawPredict`.
pub(crate) struct AnthropicStreamState {
    model: String,
    block_kinds: HashMap<usize, BlockKind>,
    next_tool_call_index: usize,
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    usage_emitted: bool,
}

impl AnthropicStreamState {
    pub(crate) fn new(model: String) -> Self {
        Self {
            model,
            block_kinds: HashMap::new(),
            next_tool_call_index: 0,
            input_tokens: None,
            output_tokens: None,
            usage_emitted: false,
        }
    }

    fn chunk(&self, delta: JsonValue, finish_reason: Option<&str>) -> JsonValue {
        serde_json::json!({
            "id": "",
            "object": "chat.completion.chunk",
            "model": self.model,
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason,
            }],
        })
    }

    fn maybe_usage_chunk(&mut self, out: &mut Vec<JsonValue>) {
        if self.usage_emitted {
            return;
        }
        if let (Some(input), Some(output)) = (self.input_tokens, self.output_tokens) {
            out.push(serde_json::json!({
                "id": "",
                "object": "chat.completion.chunk",
                "model": self.model,
                "choices": [],
                "usage": {
                    "prompt_tokens": input,
                    "completion_tokens": output,
                    "total_tokens": input + output,
                },
            }));
            self.usage_emitted = true;
        }
    }

    pub(crate) fn translate_event(&mut self, data: &str) -> Result<Vec<JsonValue>, String> {
        let event: JsonValue = serde_json::from_str(data).map_err(|err| err.to_string())?;
        let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let mut out = Vec::new();

        match event_type {
            "message_start" => {
                if let Some(v) = event
                    .pointer("/message/usage/input_tokens")
                    .and_then(JsonValue::as_i64)
                {
                    self.input_tokens = Some(v);
                }
            }
            "content_block_start" => {
                let index = event.get("index").and_then(JsonValue::as_u64).unwrap_or(0) as usize;
                let block = event.get("content_block").cloned().unwrap_or(JsonValue::Null);
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("tool_use") => {
                        let tool_call_index = self.next_tool_call_index;
                        self.next_tool_call_index += 1;
                        self.block_kinds.insert(index, BlockKind::ToolUse { tool_call_index });
                        let id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        out.push(self.chunk(
                            serde_json::json!({
                                "tool_calls": [{
                                    "index": tool_call_index,
                                    "id": id,
                                    "type": "function",
                                    "function": { "name": name, "arguments": "" },
                                }],
                            }),
                            None,
                        ));
                    }
                    _ => {
                        self.block_kinds.insert(index, BlockKind::Text);
                    }
                }
            }
            "content_block_delta" => {
                let index = event.get("index").and_then(JsonValue::as_u64).unwrap_or(0) as usize;
                let delta = event.get("delta").cloned().unwrap_or(JsonValue::Null);
                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("text_delta") => {
                        let text = delta.get("text").and_then(|v| v.as_str()).unwrap_or("");
                        if !text.is_empty() {
                            out.push(self.chunk(serde_json::json!({ "content": text }), None));
                        }
                    }
                    Some("input_json_delta") => {
                        let fragment = delta.get("partial_json").and_then(|v| v.as_str()).unwrap_or("");
                        if let Some(BlockKind::ToolUse { tool_call_index }) =
                            self.block_kinds.get(&index).copied()
                        {
                            out.push(self.chunk(
                                serde_json::json!({
                                    "tool_calls": [{
                                        "index": tool_call_index,
                                        "function": { "arguments": fragment },
                                    }],
                                }),
                                None,
                            ));
                        }
                    }
                    _ => {}
                }
            }
            "message_delta" => {
                let stop_reason = event.pointer("/delta/stop_reason").and_then(|v| v.as_str());
                if let Some(v) = event
                    .pointer("/usage/output_tokens")
                    .and_then(JsonValue::as_i64)
                {
                    self.output_tokens = Some(v);
                }
                if stop_reason.is_some() {
                    out.push(self.chunk(
                        serde_json::json!({}),
                        Some(anthropic_stop_reason_to_finish_reason(stop_reason)),
                    ));
                }
                self.maybe_usage_chunk(&mut out);
            }
            "error" => {
                let message = event
                    .pointer("/error/message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("anthropic stream error")
                    .to_string();
                return Err(message);
            }
            _ => {}
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_content_block_emits_tool_call_chunk() {
        let mut state = AnthropicStreamState::new("claude-sonnet-4".to_string());
        let chunks = state
            .translate_event(
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather"}}"#,
            )
            .unwrap();
        assert_eq!(chunks.len(), 1);
        let delta = &chunks[0]["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(delta["id"], "toolu_1");
        assert_eq!(delta["type"], "function");
        assert_eq!(delta["function"]["name"], "get_weather");
        assert_eq!(delta["function"]["arguments"], "");
    }

    #[test]
    fn input_json_delta_streams_partial_arguments() {
        let mut state = AnthropicStreamState::new("claude-sonnet-4".to_string());
        state
            .translate_event(
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather"}}"#,
            )
            .unwrap();
        let chunks = state
            .translate_event(
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"loc"}}"#,
            )
            .unwrap();
        assert_eq!(
            chunks[0]["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"],
            "{\"loc"
        );
    }

    #[test]
    fn usage_chunk_waits_for_both_input_and_output() {
        let mut state = AnthropicStreamState::new("claude-sonnet-4".to_string());
        let chunks = state
            .translate_event(r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":12}}"#)
            .unwrap();
        // finish_reason chunk only: no input_tokens captured yet.
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].get("usage").is_none());

        state.input_tokens = Some(30);
        let mut out = Vec::new();
        state.maybe_usage_chunk(&mut out);
        assert_eq!(out[0]["usage"]["prompt_tokens"], 30);
        assert_eq!(out[0]["usage"]["completion_tokens"], 12);
        assert_eq!(out[0]["choices"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn tool_call_round_trips_id_and_arguments() {
        let native = serde_json::json!({
            "id": "msg_1",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "nyc"}},
            ],
        });
        let openai = anthropic_message_to_openai(&native, "claude-sonnet-4");
        let message = &openai["choices"][0]["message"];
        assert_eq!(message["content"], JsonValue::Null);
        assert_eq!(message["tool_calls"][0]["id"], "toolu_1");
        assert_eq!(message["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(
            message["tool_calls"][0]["function"]["arguments"].as_str().unwrap(),
            serde_json::json!({"city": "nyc"}).to_string()
        );
        assert_eq!(openai["choices"][0]["finish_reason"], "tool_calls");
    }

    #[test]
    fn data_url_image_becomes_base64_source() {
        let part = serde_json::json!({
            "type": "image_url",
            "image_url": { "url": "data:image/png;base64,iVBORw0KG==" },
        });
        let block = content_part_to_anthropic(&part);
        assert_eq!(block["type"], "image");
        assert_eq!(block["source"]["type"], "base64");
        assert_eq!(block["source"]["media_type"], "image/png");
        assert_eq!(block["source"]["data"], "iVBORw0KG==");
    }

    #[test]
    fn http_image_url_becomes_url_source() {
        let part = serde_json::json!({
            "type": "image_url",
            "image_url": { "url": "https://example.com/pic.png" },
        });
        let block = content_part_to_anthropic(&part);
        assert_eq!(block["source"]["type"], "url");
        assert_eq!(block["source"]["url"], "https://example.com/pic.png");
    }
}
