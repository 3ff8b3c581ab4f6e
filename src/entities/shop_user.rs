//! Shop user entity - an operator registered with a shop.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registered operator database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shop_users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shop the user is registered with
    pub shop_id: i64,
    /// Name shown on runs and reports
    pub display_name: String,
    /// Disabled users can no longer count
    pub disabled: bool,
}

/// Defines relationships between `ShopUser` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each user belongs to one shop
    #[sea_orm(
        belongs_to = "super::shop::Entity",
        from = "Column::ShopId",
        to = "super::shop::Column::Id"
    )]
    Shop,
}

impl Related<super::shop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shop.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
