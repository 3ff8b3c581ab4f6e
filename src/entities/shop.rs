//! Shop entity - the tenant boundary.
//!
//! A shop owns its locations, registered users and product catalog.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shop database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shops")]
pub struct Model {
    /// Unique identifier for the shop
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the shop
    pub name: String,
    /// When the shop was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Shop and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One shop has many locations
    #[sea_orm(has_many = "super::location::Entity")]
    Locations,
    /// One shop has many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
