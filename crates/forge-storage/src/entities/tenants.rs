use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[sea_orm(has_many)]
    pub client_keys: HasMany<super::client_keys::Entity>,
    #[sea_orm(has_many)]
    pub credentials: HasMany<super::provider_credentials::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
