//! Count line entity - the quantity of one product recorded by one run.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Count line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "count_lines")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Run that recorded the line
    pub run_id: i64,
    /// Counted product
    pub product_id: i64,
    /// Counted quantity, non-negative, fractional allowed
    pub quantity: f64,
}

/// Defines relationships between `CountLine` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one run
    #[sea_orm(
        belongs_to = "super::counting_run::Entity",
        from = "Column::RunId",
        to = "super::counting_run::Column::Id"
    )]
    Run,
    /// Each line counts one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Conflicts raised on this line
    #[sea_orm(has_many = "super::conflict::Entity")]
    Conflicts,
}

impl Related<super::counting_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Run.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::conflict::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conflicts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
