//! Process-wide wiring: config merge, storage connection + schema sync,
//! the two-tier cache, the provider registry, and the event hub. All four
//! are built once at startup and shared for the process lifetime (spec
//! §9 "global state").

use std::sync::Arc;

use forge_cache::{Cache, CacheLayer};
use forge_common::{GlobalConfig, GlobalConfigPatch};
use forge_provider_core::{EventHub, ProviderRegistry};
use forge_provider_impl::register_builtin_providers;
use forge_storage::{SeaOrmStore, Store};

const EVENT_HUB_BUFFER: usize = 1024;

pub struct AppState {
    pub config: GlobalConfig,
    pub store: Arc<dyn Store>,
    pub cache: CacheLayer,
    pub registry: ProviderRegistry,
    pub events: EventHub,
}

/// Merges CLI > ENV, connects storage, syncs the schema, then builds the
/// cache/registry/event-hub singletons.
///
/// The third, DB-persisted config layer `GlobalConfigPatch` documents is an
/// admin-surface concern that lives outside the narrow `Store` trait this
/// crate depends on (see forge-storage's own scope note); a collaborator
/// that owns that surface can overlay it before calling this function by
/// folding it into `env`.
pub async fn bootstrap(
    cli: GlobalConfigPatch,
    env: GlobalConfigPatch,
    redis_url: Option<&str>,
) -> anyhow::Result<Arc<AppState>> {
    let mut merged = GlobalConfigPatch::default();
    merged.overlay(env);
    merged.overlay(cli);
    let config = merged.into_config()?;

    let store = SeaOrmStore::connect(&config.dsn).await?;
    store.sync().await?;

    let l2 = Cache::connect_l2(redis_url, false).await?;
    let cache = CacheLayer::new(l2);
    let registry = register_builtin_providers();
    let events = EventHub::new(EVENT_HUB_BUFFER);

    Ok(Arc::new(AppState {
        config,
        store: Arc::new(store),
        cache,
        registry,
        events,
    }))
}
