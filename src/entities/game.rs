use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Catalog item. `g2a_product_id` links the game to the wholesale
/// supplier catalog; games without it are sold from manually loaded keys
/// and are never fulfilled automatically.
#[derive(
    Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema,
)]
#[sea_orm(table_name = "games")]
#[schema(as = Game)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,

    #[sea_orm(nullable)]
    pub genre: Option<String>,

    #[sea_orm(nullable)]
    pub platform: Option<String>,

    #[sea_orm(nullable)]
    pub cover_url: Option<String>,

    pub in_stock: bool,

    #[sea_orm(nullable)]
    pub g2a_product_id: Option<String>,

    /// Supplier-reported quantity from the latest stock check.
    #[sea_orm(nullable)]
    pub g2a_stock: Option<i32>,

    #[sea_orm(nullable)]
    pub g2a_synced_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::game_key::Entity")]
    GameKeys,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::game_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GameKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
