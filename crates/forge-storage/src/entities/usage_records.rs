use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// An append-only accounting row: opened before the adapter call with
/// `updated_at = NULL`, closed by the detached finalize task once token
/// counts are known. A row whose `updated_at` stays null means the
/// request never completed token accounting.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    pub pk_id: i64,
    pub key_id: i64,
    pub model: String,
    pub endpoint: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
    pub reasoning_tokens: Option<i64>,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub cost: Option<Decimal>,
    #[sea_orm(belongs_to, from = "tenant_id", to = "id", on_delete = "Cascade")]
    pub tenant: HasOne<super::tenants::Entity>,
    #[sea_orm(belongs_to, from = "pk_id", to = "id", on_delete = "Cascade")]
    pub provider_credential: HasOne<super::provider_credentials::Entity>,
    #[sea_orm(belongs_to, from = "key_id", to = "id", on_delete = "Cascade")]
    pub client_key: HasOne<super::client_keys::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
