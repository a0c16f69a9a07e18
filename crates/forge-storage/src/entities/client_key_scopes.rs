use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Many-to-many join granting a client key permission to use one provider
/// credential. Absence of any row for a given key means "unrestricted":
/// the resolver treats a key with zero scope rows as permitted to use
/// every credential belonging to its tenant.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "client_key_scopes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "client_key_credential")]
    pub client_key_id: i64,
    #[sea_orm(unique_key = "client_key_credential")]
    pub provider_credential_id: i64,
    pub created_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "client_key_id", to = "id", on_delete = "Cascade")]
    pub client_key: HasOne<super::client_keys::Entity>,
    #[sea_orm(belongs_to, from = "provider_credential_id", to = "id", on_delete = "Cascade")]
    pub provider_credential: HasOne<super::provider_credentials::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
