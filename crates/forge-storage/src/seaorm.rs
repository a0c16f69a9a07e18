use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Database, DatabaseBackend, DatabaseConnection,
    EntityTrait, QueryFilter, Schema,
};
use time::OffsetDateTime;

use crate::entities;
use crate::snapshot::{ClientKeyRow, CredentialRow, model_name_map_from_json};
use crate::storage::{NewUsageRecord, Store, StorageResult, UsageCompletion};
use crate::snapshot::WalletRow;

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        let db = Database::connect(dsn).await?;
        if db.get_database_backend() == DatabaseBackend::Sqlite {
            use sea_orm::ConnectionTrait;
            db.execute_unprepared("PRAGMA foreign_keys = ON").await?;
        }
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::GlobalConfig)
            .register(entities::Tenants)
            .register(entities::ClientKeys)
            .register(entities::ProviderCredentials)
            .register(entities::ClientKeyScopes)
            .register(entities::UsageRecords)
            .register(entities::Wallets)
            .register(entities::PaymentRecords)
            .sync(&self.db)
            .await?;
        Ok(())
    }

    async fn load_tenant_credentials(&self, tenant_id: i64) -> StorageResult<Vec<CredentialRow>> {
        use entities::provider_credentials::Column;
        let rows = entities::ProviderCredentials::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Enabled.eq(true))
            .filter(Column::DeletedAt.is_null())
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|m| CredentialRow {
                id: m.id,
                tenant_id: m.tenant_id,
                provider_name: m.provider_name,
                ciphertext: m.ciphertext,
                base_url: m.base_url,
                model_name_map: model_name_map_from_json(&m.model_name_map),
                billable: m.billable,
                enabled: m.enabled,
            })
            .collect())
    }

    async fn load_client_key_by_secret_hash(
        &self,
        secret_hash: &str,
    ) -> StorageResult<Option<ClientKeyRow>> {
        use entities::client_key_scopes::Column as ScopeColumn;
        use entities::client_keys::Column as KeyColumn;

        let Some(key) = entities::ClientKeys::find()
            .filter(KeyColumn::SecretHash.eq(secret_hash))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let scopes = entities::ClientKeyScopes::find()
            .filter(ScopeColumn::ClientKeyId.eq(key.id))
            .all(&self.db)
            .await?;

        Ok(Some(ClientKeyRow {
            id: key.id,
            tenant_id: key.tenant_id,
            active: key.active,
            allowed_provider_credential_ids: scopes
                .into_iter()
                .map(|s| s.provider_credential_id)
                .collect(),
        }))
    }

    async fn touch_client_key_last_used(&self, key_id: i64, at: OffsetDateTime) -> StorageResult<()> {
        use entities::client_keys::Column;
        entities::ClientKeys::update_many()
            .filter(Column::Id.eq(key_id))
            .col_expr(Column::LastUsedAt, sea_orm::sea_query::Expr::value(at))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn load_wallet(&self, tenant_id: i64) -> StorageResult<Option<WalletRow>> {
        use entities::wallets::Column;
        let row = entities::Wallets::find()
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;
        Ok(row.map(|w| WalletRow {
            tenant_id: w.tenant_id,
            balance: w.balance,
            blocked: w.blocked,
            version: w.version,
        }))
    }

    async fn apply_wallet_delta(
        &self,
        tenant_id: i64,
        expected_version: i64,
        balance_delta: Decimal,
    ) -> StorageResult<bool> {
        use entities::wallets::Column;
        use sea_orm::sea_query::Expr;

        let now = now_utc();
        let result = entities::Wallets::update_many()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Version.eq(expected_version))
            .col_expr(Column::Balance, Expr::col(Column::Balance).add(balance_delta))
            .col_expr(Column::Version, Expr::col(Column::Version).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn open_usage_record(&self, record: NewUsageRecord<'_>) -> StorageResult<i64> {
        let now = now_utc();
        let active = entities::usage_records::ActiveModel {
            id: ActiveValue::NotSet,
            tenant_id: ActiveValue::Set(record.tenant_id),
            pk_id: ActiveValue::Set(record.pk_id),
            key_id: ActiveValue::Set(record.key_id),
            model: ActiveValue::Set(record.model.to_string()),
            endpoint: ActiveValue::Set(record.endpoint.to_string()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(None),
            input_tokens: ActiveValue::Set(None),
            output_tokens: ActiveValue::Set(None),
            cached_tokens: ActiveValue::Set(None),
            reasoning_tokens: ActiveValue::Set(None),
            cost: ActiveValue::Set(None),
        };
        let inserted = active.insert(&self.db).await?;
        Ok(inserted.id)
    }

    async fn close_usage_record(
        &self,
        usage_id: i64,
        completion: UsageCompletion,
        at: OffsetDateTime,
    ) -> StorageResult<()> {
        use entities::usage_records::Column;
        entities::UsageRecords::update_many()
            .filter(Column::Id.eq(usage_id))
            .col_expr(Column::InputTokens, sea_orm::sea_query::Expr::value(completion.input_tokens))
            .col_expr(Column::OutputTokens, sea_orm::sea_query::Expr::value(completion.output_tokens))
            .col_expr(Column::CachedTokens, sea_orm::sea_query::Expr::value(completion.cached_tokens))
            .col_expr(
                Column::ReasoningTokens,
                sea_orm::sea_query::Expr::value(completion.reasoning_tokens),
            )
            .col_expr(Column::Cost, sea_orm::sea_query::Expr::value(completion.cost))
            .col_expr(Column::UpdatedAt, sea_orm::sea_query::Expr::value(Some(at)))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
