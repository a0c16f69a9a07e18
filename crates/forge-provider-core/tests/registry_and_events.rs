use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use forge_provider_core::{
    Credential, Event, EventHub, EventSink, ProviderConfig, ProviderRegistry, ProviderResult,
    UpstreamProvider, mask_credential,
};
use tokio::time::timeout;

/// A minimal stateless adapter, standing in for a real provider so this
/// crate's registry/event-hub wiring can be exercised without depending on
/// `forge-provider-impl` (which depends back on this crate).
struct StubProvider;

#[async_trait]
impl UpstreamProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn default_base_url(&self) -> &'static str {
        "https://stub.example/v1"
    }

    async fn list_models(
        &self,
        _credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<Vec<String>> {
        Ok(vec!["stub-model".to_string()])
    }

    async fn process_completion(
        &self,
        _request: forge_provider_core::CompletionRequest,
        _credential: &Credential,
        _config: &ProviderConfig,
    ) -> ProviderResult<forge_provider_core::UpstreamOutcome> {
        Ok(forge_provider_core::UpstreamOutcome::Unary(
            serde_json::json!({"ok": true}),
        ))
    }
}

struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventSink for RecordingSink {
    fn write<'a>(
        &'a self,
        event: &'a Event,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        let events = self.events.clone();
        let event = event.clone();
        Box::pin(async move {
            events.lock().unwrap().push(event);
        })
    }
}

#[tokio::test]
async fn registry_looks_up_registered_adapter_by_name() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StubProvider));

    assert!(registry.get("stub").is_some());
    assert!(registry.get("unknown").is_none());
    assert!(registry.names().any(|name| name == "stub"));
}

#[tokio::test]
async fn event_hub_fans_out_to_subscribers_and_sinks() {
    let hub = EventHub::new(16);
    let mut rx = hub.subscribe();

    let events = Arc::new(Mutex::new(Vec::new()));
    hub.add_sink(Arc::new(RecordingSink { events: events.clone() })).await;

    let emitted = Event::CredentialUnavailable {
        at: time::OffsetDateTime::now_utc(),
        pk_id: 7,
        provider: "stub".to_string(),
        reason: "rate_limited".to_string(),
    };
    hub.emit(emitted.clone()).await;

    let received = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("event received within timeout")
        .unwrap();
    assert!(matches!(received, Event::CredentialUnavailable { pk_id: 7, .. }));

    // Sinks run as detached tasks; give them a moment to land.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn mask_credential_reveals_only_prefix_and_suffix() {
    let credential = Credential::ApiKey {
        api_key: "sk-abcdefghijklmnopqrstuvwxyz".to_string(),
    };
    let masked = mask_credential(&credential);
    assert!(masked.starts_with("sk"));
    assert!(masked.ends_with("wxyz"));
    assert!(!masked.contains("ghijklmnopqrst"));
}
