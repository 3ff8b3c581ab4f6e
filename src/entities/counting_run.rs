//! Counting run entity - one counting pass of one zone by one operator.
//!
//! The operator is stored as two nullable columns, exactly one of which is set.
//! They are read and written only through `core::operator::OperatorIdentity`.
//! At most one open run (`completed_at IS NULL`) may exist per
//! (session, location, count type, operator); see `config::database`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Counting run database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "counting_runs")]
pub struct Model {
    /// Unique identifier for the run
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning session
    pub session_id: i64,
    /// Zone being counted
    pub location_id: i64,
    /// Pass type: 1 first pass, 2 second pass, 3 control
    pub count_type: i32,
    /// When the run was started
    pub started_at: DateTimeUtc,
    /// When the run was completed, None while open
    pub completed_at: Option<DateTimeUtc>,
    /// Legacy free-text operator name
    pub operator_name: Option<String>,
    /// Registered operator
    pub shop_user_id: Option<i64>,
}

/// Defines relationships between `CountingRun` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each run belongs to one session
    #[sea_orm(
        belongs_to = "super::inventory_session::Entity",
        from = "Column::SessionId",
        to = "super::inventory_session::Column::Id"
    )]
    Session,
    /// Each run counts one zone
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    /// Lines recorded by this run
    #[sea_orm(has_many = "super::count_line::Entity")]
    CountLines,
}

impl Related<super::inventory_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::count_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CountLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
