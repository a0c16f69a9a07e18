use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A Stripe-originated payment row, carried inert: webhook ingestion and
/// wallet crediting are performed by the external pricing/billing
/// collaborator, not by this crate.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    pub external_ref: String,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub amount: Decimal,
    pub status: String,
    pub created_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "tenant_id", to = "id", on_delete = "Cascade")]
    pub tenant: HasOne<super::tenants::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
