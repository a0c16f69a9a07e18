//! The canonical-dialect proxy surface (spec §4): one route per endpoint
//! family, each wiring authenticate -> resolve -> precheck -> adapter
//! dispatch -> (stream bridge | unary usage finalize).

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::Value as JsonValue;

use forge_core::bootstrap::AppState;
use forge_core::error::GatewayError;
use forge_core::{authenticate, finalize_detached, load_tenant_credentials, precheck_and_open, resolve, stream_response};
use forge_protocol::openai::chat_completions::request::CreateChatCompletionRequestBody;
use forge_protocol::openai::completions::request::CreateCompletionRequestBody;
use forge_protocol::openai::embeddings::request::CreateEmbeddingRequestBody;
use forge_protocol::openai::images::request::{CreateImageEditRequestBody, CreateImageRequestBody};
use forge_protocol::openai::list_models::response::{ListModelsResponse, ListObjectType};
use forge_protocol::openai::list_models::types::{Model, ModelObjectType};
use forge_provider_core::{CompletionRequest, ProviderConfig, UpstreamOutcome};
use forge_storage::UsageCompletion;

pub fn proxy_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/images/generations", post(image_generations))
        .route("/v1/images/edits", post(image_edits))
        .route("/v1/responses", post(responses_not_implemented))
        .route("/v1/models", get(list_models))
        .with_state(state)
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<CreateChatCompletionRequestBody>,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let route = resolve(
        auth.tenant_id,
        &body.model,
        &auth.allowed_provider_credential_ids,
        state.store.as_ref(),
        &state.cache,
        &state.registry,
    )
    .await?;
    let approx_input_chars = approx_json_chars(&body.messages);
    body.model = route.native_model.clone();

    let usage = precheck_and_open(
        state.store.as_ref(),
        auth.tenant_id,
        route.pk_id,
        auth.key_id,
        &route.native_model,
        "/v1/chat/completions",
        route.billable,
    )
    .await?;

    let outcome = route
        .provider
        .process_completion(CompletionRequest::Chat(body), &route.credential, &route.config)
        .await?;

    respond(state, usage.usage_id, outcome, approx_input_chars).await
}

async fn completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<CreateCompletionRequestBody>,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let route = resolve(
        auth.tenant_id,
        &body.model,
        &auth.allowed_provider_credential_ids,
        state.store.as_ref(),
        &state.cache,
        &state.registry,
    )
    .await?;
    let approx_input_chars = approx_json_chars(&body.prompt);
    body.model = route.native_model.clone();

    let usage = precheck_and_open(
        state.store.as_ref(),
        auth.tenant_id,
        route.pk_id,
        auth.key_id,
        &route.native_model,
        "/v1/completions",
        route.billable,
    )
    .await?;

    let outcome = route
        .provider
        .process_completion(CompletionRequest::Text(body), &route.credential, &route.config)
        .await?;

    respond(state, usage.usage_id, outcome, approx_input_chars).await
}

async fn respond(
    state: Arc<AppState>,
    usage_id: i64,
    outcome: UpstreamOutcome,
    approx_input_chars: usize,
) -> Result<Response, GatewayError> {
    match outcome {
        UpstreamOutcome::Stream(canonical) => {
            stream_response(state.store.clone(), usage_id, canonical, approx_input_chars).await
        }
        UpstreamOutcome::Unary(value) => {
            let completion = usage_completion_from_unary(&value, approx_input_chars);
            finalize_detached(state.store.clone(), usage_id, completion);
            Ok(Json(value).into_response())
        }
    }
}

async fn embeddings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<CreateEmbeddingRequestBody>,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let route = resolve(
        auth.tenant_id,
        &body.model,
        &auth.allowed_provider_credential_ids,
        state.store.as_ref(),
        &state.cache,
        &state.registry,
    )
    .await?;
    let approx_input_chars = approx_json_chars(&body.input);
    body.model = route.native_model.clone();

    let usage = precheck_and_open(
        state.store.as_ref(),
        auth.tenant_id,
        route.pk_id,
        auth.key_id,
        &route.native_model,
        "/v1/embeddings",
        route.billable,
    )
    .await?;

    let value = route
        .provider
        .process_embeddings(body, &route.credential, &route.config)
        .await?;
    let completion = usage_completion_from_unary(&value, approx_input_chars);
    finalize_detached(state.store.clone(), usage.usage_id, completion);
    Ok(Json(value).into_response())
}

async fn image_generations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<CreateImageRequestBody>,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let model = body
        .model
        .clone()
        .ok_or_else(|| GatewayError::InvalidRequest("model is required".to_string()))?;
    let route = resolve(
        auth.tenant_id,
        &model,
        &auth.allowed_provider_credential_ids,
        state.store.as_ref(),
        &state.cache,
        &state.registry,
    )
    .await?;
    let approx_input_chars = body.prompt.len();
    body.model = Some(route.native_model.clone());

    let usage = precheck_and_open(
        state.store.as_ref(),
        auth.tenant_id,
        route.pk_id,
        auth.key_id,
        &route.native_model,
        "/v1/images/generations",
        route.billable,
    )
    .await?;

    let value = route
        .provider
        .process_image_generation(body, &route.credential, &route.config)
        .await?;
    let completion = usage_completion_from_unary(&value, approx_input_chars);
    finalize_detached(state.store.clone(), usage.usage_id, completion);
    Ok(Json(value).into_response())
}

async fn image_edits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<CreateImageEditRequestBody>,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let model = body
        .model
        .clone()
        .ok_or_else(|| GatewayError::InvalidRequest("model is required".to_string()))?;
    let route = resolve(
        auth.tenant_id,
        &model,
        &auth.allowed_provider_credential_ids,
        state.store.as_ref(),
        &state.cache,
        &state.registry,
    )
    .await?;
    let approx_input_chars = body.prompt.len();
    body.model = Some(route.native_model.clone());

    let usage = precheck_and_open(
        state.store.as_ref(),
        auth.tenant_id,
        route.pk_id,
        auth.key_id,
        &route.native_model,
        "/v1/images/edits",
        route.billable,
    )
    .await?;

    let value = route
        .provider
        .process_image_edits(body, &route.credential, &route.config)
        .await?;
    let completion = usage_completion_from_unary(&value, approx_input_chars);
    finalize_detached(state.store.clone(), usage.usage_id, completion);
    Ok(Json(value).into_response())
}

/// No adapter implements the Responses API translation; spec §4.2 scopes
/// adapters to the chat/text/embeddings/image surfaces.
async fn responses_not_implemented() -> GatewayError {
    GatewayError::NotImplemented("/v1/responses has no adapter implementation".to_string())
}

/// Lists every model a tenant's active, scoped credentials expose,
/// prefixed `{provider}/{native}` (spec §4.1 canonical naming). Each
/// provider's native list is cached under `models:{provider}:{base_url_hash}`
/// for that adapter's own `list_models_cache_ttl`.
async fn list_models(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let auth = authenticate(&headers, state.store.as_ref(), &state.cache).await?;
    let credentials = load_tenant_credentials(auth.tenant_id, state.store.as_ref(), &state.cache).await?;

    let mut data = Vec::new();
    for (provider_name, row) in credentials {
        if !row.enabled {
            continue;
        }
        if !auth.allowed_provider_credential_ids.is_empty()
            && !auth.allowed_provider_credential_ids.contains(&row.id)
        {
            continue;
        }
        let Some(provider) = state.registry.get(&provider_name) else {
            continue;
        };
        let Ok(credential) = provider.deserialize_credential(&row.ciphertext) else {
            continue;
        };
        let config = ProviderConfig {
            base_url: row.base_url.clone(),
            model_name_map: row.model_name_map.clone(),
            billable: row.billable,
            extra_headers: Vec::new(),
        };

        let base_url_hash = blake3::hash(
            config
                .base_url
                .as_deref()
                .unwrap_or(provider.default_base_url())
                .as_bytes(),
        )
        .to_hex()
        .to_string();
        let cache_key = forge_cache::keys::models(&provider_name, &base_url_hash);
        let natives = match state.cache.long.get::<Vec<String>>(&cache_key).await {
            Ok(Some(cached)) => cached,
            _ => {
                let fetched = provider.list_models(&credential, &config).await.unwrap_or_default();
                let _ = state
                    .cache
                    .long
                    .set(&cache_key, &fetched, provider.list_models_cache_ttl())
                    .await;
                fetched
            }
        };

        for native in natives {
            data.push(Model {
                id: format!("{provider_name}/{native}"),
                display_name: None,
                object: ModelObjectType::Model,
                created: 0,
                owned_by: provider_name.clone(),
            });
        }
    }

    Ok(Json(ListModelsResponse {
        object: ListObjectType::List,
        data,
    })
    .into_response())
}

fn approx_json_chars<T: Serialize>(value: &T) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Pulls token counts out of a unary response's `usage` object the same
/// way the streaming bridge's accumulator does (spec §4.3's
/// `output_tokens = max(reported, total - input)` correction), for the
/// non-streaming adapters that return one `usage` block instead of a
/// per-chunk series.
fn usage_completion_from_unary(value: &JsonValue, approx_input_chars: usize) -> UsageCompletion {
    let usage = value.get("usage");
    let prompt_tokens = usage.and_then(|u| u.get("prompt_tokens")).and_then(JsonValue::as_i64);
    let completion_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(JsonValue::as_i64);
    let total_tokens = usage.and_then(|u| u.get("total_tokens")).and_then(JsonValue::as_i64);
    let cached_tokens = usage
        .and_then(|u| u.get("prompt_tokens_details"))
        .and_then(|d| d.get("cached_tokens"))
        .and_then(JsonValue::as_i64);
    let reasoning_tokens = usage
        .and_then(|u| u.get("completion_tokens_details"))
        .and_then(|d| d.get("reasoning_tokens"))
        .and_then(JsonValue::as_i64);

    let output_tokens = match (completion_tokens, total_tokens, prompt_tokens) {
        (Some(reported), Some(total), Some(input)) => Some(reported.max(total - input)),
        (Some(reported), _, _) => Some(reported),
        (None, Some(total), Some(input)) => Some((total - input).max(0)),
        (None, _, _) => None,
    };
    let input_tokens = prompt_tokens.or(Some((approx_input_chars / 4) as i64));

    UsageCompletion {
        input_tokens,
        output_tokens,
        cached_tokens,
        reasoning_tokens,
        cost: None,
    }
}
