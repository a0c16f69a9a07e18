use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A tenant-owned secret presented by callers as `Authorization: Bearer
/// forge-{hex}` or `X-API-KEY: forge-{hex}`. Only the hash of the secret
/// (without its `forge-` prefix) is stored; the plaintext is shown once at
/// creation time by the admin collaborator and never again.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "client_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    #[sea_orm(unique_key = "client_key_hash")]
    pub secret_hash: String,
    pub label: Option<String>,
    pub active: bool,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "tenant_id", to = "id", on_delete = "Cascade")]
    pub tenant: HasOne<super::tenants::Entity>,
    #[sea_orm(has_many)]
    pub scopes: HasMany<super::client_key_scopes::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
