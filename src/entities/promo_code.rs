use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Percentage discount code with a usage cap and a validity window.
///
/// Invariant: `used_count <= max_uses` when `max_uses` is set. The
/// increment is a guarded conditional update, so two concurrent
/// redemptions cannot both take the last use.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "promo_codes")]
#[schema(as = PromoCode)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub code: String,

    /// Percent off the order subtotal, in (0, 100].
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount_percent: Decimal,

    pub active: bool,

    pub used_count: i32,

    /// None means unlimited uses.
    #[sea_orm(nullable)]
    pub max_uses: Option<i32>,

    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this code discounts an order placed at `now`.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(max) = self.max_uses {
            if self.used_count >= max {
                return false;
            }
        }
        self.valid_from <= now && now <= self.valid_until
    }
}
