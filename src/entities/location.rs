//! Location entity - a counting zone inside a shop.
//!
//! The zone code is unique per shop, compared case-insensitively
//! (enforced by an expression index, see `config::database`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Location database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    /// Unique identifier for the location
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning shop
    pub shop_id: i64,
    /// Zone code as typed by the administrator (e.g. "A-01")
    pub code: String,
    /// Human-readable label
    pub label: String,
    /// Disabled zones cannot be counted
    pub disabled: bool,
}

/// Defines relationships between Location and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each location belongs to one shop
    #[sea_orm(
        belongs_to = "super::shop::Entity",
        from = "Column::ShopId",
        to = "super::shop::Column::Id"
    )]
    Shop,
    /// Runs counted in this zone
    #[sea_orm(has_many = "super::counting_run::Entity")]
    CountingRuns,
}

impl Related<super::shop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shop.def()
    }
}

impl Related<super::counting_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CountingRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
