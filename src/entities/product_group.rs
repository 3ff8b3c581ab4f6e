//! Product group entity - the optional catalog taxonomy.
//!
//! Top-level groups have no parent; sub-groups point at their group.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_groups")]
pub struct Model {
    /// Unique identifier for the group
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning shop
    pub shop_id: i64,
    /// Group name as found in the catalog file
    pub name: String,
    /// Parent group for sub-groups
    pub parent_id: Option<i64>,
}

/// Defines relationships between `ProductGroup` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each group belongs to one shop
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
