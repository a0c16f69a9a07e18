use forge_provider_core::ProviderRegistry;

use crate::builtin::builtin_provider_seeds;

/// Populates a fresh registry with every built-in adapter. Call once at
/// startup; the resulting registry is shared read-only behind an `Arc`.
pub fn register_builtin_providers() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for seed in builtin_provider_seeds() {
        registry.register(seed.provider);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_openai_and_anthropic() {
        let registry = register_builtin_providers();
        assert!(registry.get("openai").is_some());
        assert!(registry.get("anthropic").is_some());
    }
}
