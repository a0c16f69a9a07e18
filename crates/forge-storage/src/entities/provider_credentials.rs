use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One tenant's stored secret for a single upstream provider. `ciphertext`
/// is the adapter's own opaque serialization (`UpstreamProvider::
/// serialize_credential`); this crate never parses it. `model_name_map`
/// remaps canonical model ids to the provider's native ids.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_credentials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "tenant_provider")]
    pub tenant_id: i64,
    #[sea_orm(unique_key = "tenant_provider")]
    pub provider_name: String,
    pub ciphertext: String,
    pub base_url: Option<String>,
    pub model_name_map: Json,
    pub billable: bool,
    pub enabled: bool,
    pub deleted_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "tenant_id", to = "id", on_delete = "Cascade")]
    pub tenant: HasOne<super::tenants::Entity>,
    #[sea_orm(has_many)]
    pub scopes: HasMany<super::client_key_scopes::Entity>,
    #[sea_orm(has_many)]
    pub usage_records: HasMany<super::usage_records::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
