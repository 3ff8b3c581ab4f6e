//! Inventory session entity - grouping wrapper created with the first run of a
//! (zone, pass) pair. Completed when its run completes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_sessions")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shop being counted
    pub shop_id: i64,
    /// Label, e.g. "A-01 / pass 1"
    pub name: String,
    /// When the session was opened
    pub started_at: DateTimeUtc,
    /// When the session was completed, None while open
    pub completed_at: Option<DateTimeUtc>,
}

/// Defines relationships between `InventorySession` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each session belongs to one shop
    #[sea_orm(
        belongs_to = "super::shop::Entity",
        from = "Column::ShopId",
        to = "super::shop::Column::Id"
    )]
    Shop,
    /// Runs grouped by this session
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
