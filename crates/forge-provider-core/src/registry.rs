use std::collections::HashMap;
use std::sync::Arc;

use crate::UpstreamProvider;

/// Static provider name -> adapter table, built once at process startup and
/// never mutated afterward (spec §9 "Global state"). Adapters are
/// stateless, so the same `Arc` is shared across every concurrent request.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn UpstreamProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn UpstreamProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn UpstreamProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn UpstreamProvider>)> {
        self.providers.iter().map(|(name, provider)| (*name, provider))
    }
}
