//! Usage tracker and wallet precheck (spec §4.5).
//!
//! Wallet *deduction* is a separate pricing/billing component closing over
//! the finalized usage row; out of scope here. This module only does the
//! two things the hot path owns: the billable admission check before
//! dispatch, and opening/closing the usage row around it.

use std::sync::Arc;

use forge_storage::{NewUsageRecord, Store, UsageCompletion};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::error::GatewayError;

pub struct UsageHandle {
    pub usage_id: i64,
}

/// Runs the billable precheck (if `billable`) and opens a usage row.
/// Returns `payment_required` when the tenant's wallet is blocked or
/// exhausted.
pub async fn precheck_and_open(
    store: &dyn Store,
    tenant_id: i64,
    pk_id: i64,
    key_id: i64,
    model: &str,
    endpoint: &str,
    billable: bool,
) -> Result<UsageHandle, GatewayError> {
    if billable {
        let wallet = store
            .load_wallet(tenant_id)
            .await
            .map_err(|err| GatewayError::Internal(err.to_string()))?;
        match wallet {
            None => {
                return Err(GatewayError::PaymentRequired(
                    "tenant has no wallet on file".to_string(),
                ));
            }
            Some(w) if w.blocked => {
                return Err(GatewayError::PaymentRequired("wallet is blocked".to_string()));
            }
            Some(w) if w.balance <= Decimal::ZERO => {
                return Err(GatewayError::PaymentRequired("wallet balance exhausted".to_string()));
            }
            Some(_) => {}
        }
    }

    let usage_id = store
        .open_usage_record(NewUsageRecord {
            tenant_id,
            pk_id,
            key_id,
            model,
            endpoint,
        })
        .await
        .map_err(|err| GatewayError::Internal(err.to_string()))?;

    Ok(UsageHandle { usage_id })
}

/// Closes the usage row from a detached task so it completes independent of
/// the request/stream's own lifetime (spec §4.3 cancellation semantics).
pub fn finalize_detached(store: Arc<dyn Store>, usage_id: i64, completion: UsageCompletion) {
    tokio::spawn(async move {
        if let Err(err) = store
            .close_usage_record(usage_id, completion, OffsetDateTime::now_utc())
            .await
        {
            tracing::warn!(usage_id, %err, "failed to close usage record");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_storage::{ClientKeyRow, CredentialRow, StorageResult, WalletRow};
    use std::sync::Mutex;

    struct FakeStore {
        wallet: Option<WalletRow>,
        opened: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Store for FakeStore {
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
            Ok(self.wallet.clone())
        }
        async fn apply_wallet_delta(&self, _tenant_id: i64, _expected_version: i64, _delta: Decimal) -> StorageResult<bool> {
            Ok(true)
        }
        async fn open_usage_record(&self, _record: NewUsageRecord<'_>) -> StorageResult<i64> {
            self.opened.lock().unwrap().push(1);
            Ok(42)
        }
        async fn close_usage_record(&self, _usage_id: i64, _completion: UsageCompletion, _at: OffsetDateTime) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn blocked_wallet_fails_payment_required() {
        let store = FakeStore {
            wallet: Some(WalletRow { tenant_id: 1, balance: Decimal::new(100, 0), blocked: true, version: 1 }),
            opened: Mutex::new(Vec::new()),
        };
        let err = precheck_and_open(&store, 1, 1, 1, "gpt-4o", "/v1/chat/completions", true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_required");
    }

    #[tokio::test]
    async fn exhausted_balance_fails_payment_required() {
        let store = FakeStore {
            wallet: Some(WalletRow { tenant_id: 1, balance: Decimal::ZERO, blocked: false, version: 1 }),
            opened: Mutex::new(Vec::new()),
        };
        let err = precheck_and_open(&store, 1, 1, 1, "gpt-4o", "/v1/chat/completions", true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_required");
    }

    #[tokio::test]
    async fn non_billable_skips_wallet_check() {
        let store = FakeStore { wallet: None, opened: Mutex::new(Vec::new()) };
        let handle = precheck_and_open(&store, 1, 1, 1, "gpt-4o", "/v1/chat/completions", false)
            .await
            .unwrap();
        assert_eq!(handle.usage_id, 42);
    }
}
