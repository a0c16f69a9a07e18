//! The built-in provider catalogue: every vendor the gateway understands
//! out of the box, with the adapter that speaks its dialect and the
//! default base URL used when a tenant's credential does not override one.

use std::sync::Arc;

use forge_provider_core::UpstreamProvider;

use crate::providers::anthropic::AnthropicProvider;
use crate::providers::azure::AzureProvider;
use crate::providers::bedrock::BedrockProvider;
use crate::providers::cohere::CohereProvider;
use crate::providers::gemini::GeminiProvider;
use crate::providers::openai::OpenAICompatProvider;
use crate::providers::vertex::VertexProvider;

/// One entry in the built-in catalogue: a provider name paired with the
/// adapter instance that implements it.
pub struct BuiltinProviderSeed {
    pub name: &'static str,
    pub provider: Arc<dyn UpstreamProvider>,
}

/// OpenAI-compatible vendors differ only in name and default host; every
/// other dialect gets its own adapter.
const OPENAI_COMPAT_VENDORS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com/v1"),
    ("fireworks", "https://api.fireworks.ai/inference/v1"),
    ("together", "https://api.together.xyz/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("mistral", "https://api.mistral.ai/v1"),
    ("perplexity", "https://api.perplexity.ai"),
    ("deepinfra", "https://api.deepinfra.com/v1/openai"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("alibaba", "https://dashscope-intl.aliyuncs.com/compatible-mode/v1"),
    ("moonshot", "https://api.moonshot.ai/v1"),
    ("nvidia", "https://integrate.api.nvidia.com/v1"),
    ("deepseek", "https://api.deepseek.com/v1"),
    ("tensorblock", "https://api.tensorblock.co/v1"),
    ("xai", "https://api.x.ai/v1"),
    ("cerebras", "https://api.cerebras.ai/v1"),
    ("sambanova", "https://api.sambanova.ai/v1"),
    ("novita", "https://api.novita.ai/v3/openai"),
    ("hyperbolic", "https://api.hyperbolic.xyz/v1"),
    ("lambda", "https://api.lambdalabs.com/v1"),
    ("baseten", "https://inference.baseten.co/v1"),
];

pub fn builtin_provider_seeds() -> Vec<BuiltinProviderSeed> {
    let mut seeds: Vec<BuiltinProviderSeed> = OPENAI_COMPAT_VENDORS
        .iter()
        .map(|(name, base_url)| BuiltinProviderSeed {
            name,
            provider: Arc::new(OpenAICompatProvider::new(name, base_url)),
        })
        .collect();

    seeds.push(BuiltinProviderSeed {
        name: "anthropic",
        provider: Arc::new(AnthropicProvider::new()),
    });
    seeds.push(BuiltinProviderSeed {
        name: "gemini",
        provider: Arc::new(GeminiProvider::new()),
    });
    seeds.push(BuiltinProviderSeed {
        name: "azure",
        provider: Arc::new(AzureProvider::new()),
    });
    seeds.push(BuiltinProviderSeed {
        name: "bedrock",
        provider: Arc::new(BedrockProvider::new()),
    });
    seeds.push(BuiltinProviderSeed {
        name: "vertex",
        provider: Arc::new(VertexProvider::new()),
    });
    seeds.push(BuiltinProviderSeed {
        name: "cohere",
        provider: Arc::new(CohereProvider::new()),
    });

    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_names_are_unique() {
        let seeds = builtin_provider_seeds();
        let mut names: Vec<&str> = seeds.iter().map(|seed| seed.name).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn covers_every_non_openai_family_dialect() {
        let names: Vec<&str> = builtin_provider_seeds().iter().map(|seed| seed.name).collect();
        for expected in ["anthropic", "gemini", "azure", "bedrock", "vertex", "cohere"] {
            assert!(names.contains(&expected));
        }
    }
}
