//! The narrow persistence interface the core actually calls at request
//! time. Everything admin-CRUD (creating tenants, rotating keys, querying
//! traffic logs) is a collaborator concern outside this crate; `Store`
//! only covers what the resolver, usage tracker, and wallet precheck need.

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::snapshot::{ClientKeyRow, CredentialRow, WalletRow};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
    #[error("wallet update lost the compare-and-set race after {attempts} attempts")]
    WalletCasExhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct NewUsageRecord<'a> {
    pub tenant_id: i64,
    pub pk_id: i64,
    pub key_id: i64,
    pub model: &'a str,
    pub endpoint: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct UsageCompletion {
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
    pub reasoning_tokens: Option<i64>,
    pub cost: Option<Decimal>,
}

/// Schema-sync + request-time reads/writes. Schema sync runs once at
/// bootstrap; every other method is called from the hot request path or a
/// detached finalize task and must not block on anything but the database.
#[async_trait]
pub trait Store: Send + Sync {
    async fn sync(&self) -> StorageResult<()>;

    /// Active, non-deleted credentials for a tenant, keyed by provider
    /// name at the call site. Backs `provider_keys:{tenant_id}`.
    async fn load_tenant_credentials(&self, tenant_id: i64) -> StorageResult<Vec<CredentialRow>>;

    async fn load_client_key_by_secret_hash(
        &self,
        secret_hash: &str,
    ) -> StorageResult<Option<ClientKeyRow>>;

    async fn touch_client_key_last_used(&self, key_id: i64, at: OffsetDateTime) -> StorageResult<()>;

    async fn load_wallet(&self, tenant_id: i64) -> StorageResult<Option<WalletRow>>;

    /// Optimistic compare-and-set: succeeds only if `version` still matches
    /// what was last read. Callers retry on a CAS miss.
    async fn apply_wallet_delta(
        &self,
        tenant_id: i64,
        expected_version: i64,
        balance_delta: Decimal,
    ) -> StorageResult<bool>;

    /// Inserts an open usage row (`updated_at = NULL`) and returns its id.
    async fn open_usage_record(&self, record: NewUsageRecord<'_>) -> StorageResult<i64>;

    /// Closes a usage row with final token counts. Called from a detached
    /// task that owns its own session; must tolerate the row no longer
    /// being reachable from the original request's transaction.
    async fn close_usage_record(
        &self,
        usage_id: i64,
        completion: UsageCompletion,
        at: OffsetDateTime,
    ) -> StorageResult<()>;
}

/// Retry wrapper around [`Store::apply_wallet_delta`] (spec §5 "Wallet
/// CAS"): re-reads the current version on every attempt via `read_version`,
/// retries up to 3 times with a ~10ms sleep on a lost compare-and-set, and
/// never blocks on insufficient balance — deductions are always permitted,
/// only new-request admission checks the balance (spec §3).
pub async fn apply_wallet_delta_with_retry<F, Fut>(
    store: &dyn Store,
    tenant_id: i64,
    delta: Decimal,
    mut read_version: F,
) -> StorageResult<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = StorageResult<i64>>,
{
    const MAX_RETRIES: u32 = 3;
    const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(10);

    for attempt in 0..MAX_RETRIES {
        let expected_version = read_version().await?;
        if store.apply_wallet_delta(tenant_id, expected_version, delta).await? {
            return Ok(());
        }
        if attempt + 1 < MAX_RETRIES {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
    Err(StorageError::WalletCasExhausted { attempts: MAX_RETRIES })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ClientKeyRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    struct FlakyStore {
        version: AtomicI64,
        succeeds_on_version: i64,
        delta_calls: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn sync(&self) -> StorageResult<()> {
            Ok(())
        }
        async fn load_tenant_credentials(&self, _tenant_id: i64) -> StorageResult<Vec<CredentialRow>> {
            Ok(Vec::new())
        }
        async fn load_client_key_by_secret_hash(&self, _hash: &str) -> StorageResult<Option<ClientKeyRow>> {
            Ok(None)
        }
        async fn touch_client_key_last_used(&self, _key_id: i64, _at: OffsetDateTime) -> StorageResult<()> {
            Ok(())
        }
        async fn load_wallet(&self, _tenant_id: i64) -> StorageResult<Option<WalletRow>> {
            Ok(None)
        }
        async fn apply_wallet_delta(
            &self,
            _tenant_id: i64,
            expected_version: i64,
            delta: Decimal,
        ) -> StorageResult<bool> {
            self.delta_calls.lock().unwrap().push(expected_version);
            // Another writer bumps the version concurrently until we finally
            // observe `succeeds_on_version`.
            if expected_version == self.succeeds_on_version {
                return Ok(true);
            }
            self.version.fetch_add(1, Ordering::SeqCst);
            let _ = delta;
            Ok(false)
        }
        async fn open_usage_record(&self, _record: NewUsageRecord<'_>) -> StorageResult<i64> {
            Ok(1)
        }
        async fn close_usage_record(
            &self,
            _usage_id: i64,
            _completion: UsageCompletion,
            _at: OffsetDateTime,
        ) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn retries_on_cas_conflict_then_succeeds() {
        let store = FlakyStore {
            version: AtomicI64::new(0),
            succeeds_on_version: 1,
            delta_calls: Mutex::new(Vec::new()),
        };
        let result = apply_wallet_delta_with_retry(&store, 1, Decimal::new(-500, 2), || async {
            Ok(store.version.load(Ordering::SeqCst))
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(store.delta_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhausts_after_three_attempts() {
        let store = FlakyStore {
            version: AtomicI64::new(0),
            succeeds_on_version: 99,
            delta_calls: Mutex::new(Vec::new()),
        };
        let err = apply_wallet_delta_with_retry(&store, 1, Decimal::new(-500, 2), || async {
            Ok(store.version.load(Ordering::SeqCst))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::WalletCasExhausted { attempts: 3 }));
        assert_eq!(store.delta_calls.lock().unwrap().len(), 3);
    }
}
