//! Minimal ambient admin surface: a health check and the list of
//! registered provider names. Tenant/key/credential CRUD is an external
//! collaborator concern.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use forge_core::bootstrap::AppState;

pub fn admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/providers", get(providers))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn healthz() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Serialize)]
struct ProvidersBody {
    providers: Vec<&'static str>,
}

async fn providers(State(state): State<Arc<AppState>>) -> Json<ProvidersBody> {
    let mut providers: Vec<&'static str> = state.registry.names().collect();
    providers.sort_unstable();
    Json(ProvidersBody { providers })
}
