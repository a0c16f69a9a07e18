pub mod db;
pub mod entities;
pub mod seaorm;
pub mod snapshot;
pub mod storage;

pub use seaorm::SeaOrmStore;
pub use snapshot::{ClientKeyRow, CredentialRow, StorageSnapshot, TenantCredentialSet, WalletRow};
pub use storage::{
    NewUsageRecord, Store, StorageError, StorageResult, UsageCompletion, apply_wallet_delta_with_retry,
};
