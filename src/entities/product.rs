//! Product entity - one catalog item of a shop.
//!
//! `sku_key` is the normalized SKU used for the per-shop uniqueness index and
//! case-insensitive lookups. `ean` is kept verbatim as imported or scanned, and
//! `code_digits` is its digit-only normalization. Both derived columns are only
//! ever written through `core::product`, so they cannot drift from their source.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning shop
    pub shop_id: i64,
    /// Stock keeping unit, as imported
    pub sku: String,
    /// Trimmed, lowercased SKU
    pub sku_key: String,
    /// Display name
    pub name: String,
    /// Raw barcode or vendor code, stored verbatim
    pub ean: Option<String>,
    /// Digits of `ean`, used for ambiguous matching
    pub code_digits: Option<String>,
    /// Free-form attributes (unmapped catalog columns)
    pub attributes: Option<Json>,
    /// Optional taxonomy group
    pub group_id: Option<i64>,
    /// When the product was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one shop
    #[sea_orm(
        belongs_to = "super::shop::Entity",
        from = "Column::ShopId",
        to = "super::shop::Column::Id"
    )]
    Shop,
    /// Optional group of the product
    #[sea_orm(
        belongs_to = "super::product_group::Entity",
        from = "Column::GroupId",
        to = "super::product_group::Column::Id"
    )]
    Group,
    /// Lines counting this product
    #[sea_orm(has_many = "super::count_line::Entity")]
    CountLines,
}

impl Related<super::shop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shop.def()
    }
}

impl Related<super::product_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::count_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CountLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
