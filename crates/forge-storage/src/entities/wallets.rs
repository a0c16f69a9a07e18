use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// A tenant's prepaid balance. Mutations use optimistic compare-and-set on
/// `version`: read, compute, `UPDATE ... WHERE version = $read`, retry on
/// zero rows affected. Deductions are never blocked by balance; only the
/// pre-call admission check (`blocked OR balance <= 0`) does.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "wallet_tenant")]
    pub tenant_id: i64,
    #[sea_orm(column_type = "Decimal(Some((18, 6)))")]
    pub balance: Decimal,
    pub blocked: bool,
    pub version: i64,
    pub updated_at: OffsetDateTime,
    #[sea_orm(belongs_to, from = "tenant_id", to = "id", on_delete = "Cascade")]
    pub tenant: HasOne<super::tenants::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
