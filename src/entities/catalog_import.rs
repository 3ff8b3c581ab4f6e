//! Catalog import record - the last catalog file processed for a shop.
//! Used to detect identical re-submissions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog import record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_imports")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shop the catalog belongs to (one record per shop)
    pub shop_id: i64,
    /// Hex SHA-256 of the last processed file
    pub file_hash: String,
    /// Number of valid rows in that file
    pub row_count: i64,
    /// When the file was processed
    pub imported_at: DateTimeUtc,
}

/// `CatalogImport` only points back at its shop
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record belongs to one shop
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
