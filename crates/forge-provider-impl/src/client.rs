use std::sync::{Arc, OnceLock};

use forge_provider_core::ProviderError;
use reqwest::Proxy;

struct SharedClient {
    proxy: Option<String>,
    client: Arc<reqwest::Client>,
}

static SHARED_CLIENT: OnceLock<SharedClient> = OnceLock::new();

/// One global HTTP client shared by every adapter. Connection pools are
/// per-host inside `reqwest`, so a single client already keeps-alive
/// connections to each provider independently; only one proxy can be
/// configured per process.
pub(crate) fn shared_client(proxy: Option<&str>) -> Result<Arc<reqwest::Client>, ProviderError> {
    let proxy_owned = proxy.map(|value| value.to_string());
    if let Some(shared) = SHARED_CLIENT.get() {
        if shared.proxy != proxy_owned {
            return Err(ProviderError::Other(
                "proxy mismatch: only a single global proxy is supported".to_string(),
            ));
        }
        return Ok(shared.client.clone());
    }

    let mut builder = reqwest::Client::builder();
    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url)?;
        builder = builder.proxy(proxy);
    }

    let client = builder.build()?;
    let shared = SharedClient {
        proxy: proxy_owned,
        client: Arc::new(client),
    };
    let _ = SHARED_CLIENT.set(shared);
    Ok(SHARED_CLIENT
        .get()
        .expect("shared client must be set")
        .client
        .clone())
}
