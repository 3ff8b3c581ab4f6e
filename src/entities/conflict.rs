//! Conflict entity - marks a count line whose quantity disagrees with another
//! pass of the same zone. Unresolved conflicts anchor the comparison window
//! computed by `core::conflicts`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conflict database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conflicts")]
pub struct Model {
    /// Unique identifier for the conflict
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Line the conflict is anchored to
    pub count_line_id: i64,
    /// Whether an administrator settled the quantity
    pub is_resolved: bool,
    /// Final quantity chosen on resolution
    pub resolved_quantity: Option<f64>,
    /// When the conflict was resolved
    pub resolved_at: Option<DateTimeUtc>,
    /// Optional free-text note
    pub note: Option<String>,
    /// When the conflict was raised
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Conflict and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each conflict is anchored to one line
    #[sea_orm(
        belongs_to = "super::count_line::Entity",
        from = "Column::CountLineId",
        to = "super::count_line::Column::Id"
    )]
    CountLine,
}

impl Related<super::count_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CountLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
