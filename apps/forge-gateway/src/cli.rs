//! CLI flag parsing and the CLI/ENV `GlobalConfigPatch` layers that
//! `forge_core::bootstrap::bootstrap` merges ahead of any DB-stored
//! default (spec §9 "global state": config merge order is CLI > ENV > DB).

use clap::Parser;
use forge_common::GlobalConfigPatch;

#[derive(Parser, Debug)]
#[command(name = "forge-gateway", about = "Multi-tenant AI inference gateway")]
pub struct Cli {
    /// Database DSN. Defaults to a sqlite file under `--data-dir` when empty.
    #[arg(long, default_value = "")]
    pub dsn: String,
    /// Directory used to derive a default sqlite DSN when `--dsn` is empty.
    #[arg(long, default_value = "")]
    pub data_dir: String,
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 8787)]
    pub port: u16,
    /// Plaintext admin key; only its blake3 hash is kept in `GlobalConfig`.
    #[arg(long, default_value = "pwd")]
    pub admin_key: String,
    /// Outbound proxy used for upstream provider requests.
    #[arg(long)]
    pub proxy: Option<String>,
    /// Optional shared L2 cache (redis://...). Absent means L1-only.
    #[arg(long)]
    pub redis_url: Option<String>,
}

/// Builds the CLI-precedence config patch. Flags left at their clap
/// defaults (empty string / `None`) are treated as "not set" so they don't
/// shadow a value supplied through the environment layer.
pub fn cli_patch(cli: &Cli) -> GlobalConfigPatch {
    GlobalConfigPatch {
        host: non_empty(&cli.host),
        port: Some(cli.port),
        admin_key_hash: non_empty(&cli.admin_key).map(|key| hash_admin_key(&key)),
        proxy: cli.proxy.clone(),
        dsn: non_empty(&cli.dsn),
        event_redact_sensitive: None,
    }
}

/// Builds the ENV-precedence config patch from process environment
/// variables, kept as a distinct layer from CLI flags per the bootstrap
/// merge order.
pub fn env_patch() -> GlobalConfigPatch {
    GlobalConfigPatch {
        host: env_string("FORGE_HOST"),
        port: env_string("FORGE_PORT").and_then(|value| value.parse().ok()),
        admin_key_hash: env_string("FORGE_ADMIN_KEY").map(|key| hash_admin_key(&key)),
        proxy: env_string("FORGE_PROXY"),
        dsn: env_string("FORGE_DSN"),
        event_redact_sensitive: env_string("FORGE_EVENT_REDACT_SENSITIVE")
            .and_then(|value| value.parse().ok()),
    }
}

pub fn redis_url(cli: &Cli) -> Option<String> {
    cli.redis_url.clone().or_else(|| env_string("FORGE_REDIS_URL"))
}

/// Same hashing scheme as client-key lookup (`blake3`, hex-encoded) so the
/// plaintext admin key never needs to be stored or logged.
pub fn hash_admin_key(admin_key: &str) -> String {
    blake3::hash(admin_key.as_bytes()).to_hex().to_string()
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_patch_skips_default_empty_strings() {
        let cli = Cli {
            dsn: String::new(),
            data_dir: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8787,
            admin_key: "pwd".to_string(),
            proxy: None,
            redis_url: None,
        };
        let patch = cli_patch(&cli);
        assert_eq!(patch.dsn, None);
        assert_eq!(patch.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(patch.admin_key_hash, Some(hash_admin_key("pwd")));
    }

    #[test]
    fn admin_key_hash_is_stable() {
        assert_eq!(hash_admin_key("pwd"), hash_admin_key("pwd"));
        assert_ne!(hash_admin_key("pwd"), hash_admin_key("other"));
    }
}
