//! Product business logic - normalization rules and catalog rows.
//!
//! This module owns the two normalizations every other component relies on:
//! the SKU key (trimmed, lowercased) and the digit-only form of a raw code.
//! Products are only ever built through [`NewProduct`], which derives both
//! columns from their source so they cannot drift.

use crate::{
    entities::{Product, product},
    errors::{ConflictReason, Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Normalized SKU used for per-shop uniqueness and case-insensitive lookup.
#[must_use]
pub fn normalize_sku(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Every ASCII digit of `raw`, in order.
#[must_use]
pub fn code_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Digit form stored alongside a raw code; `None` when it has no digits.
#[must_use]
pub fn stored_code_digits(raw: Option<&str>) -> Option<String> {
    raw.map(code_digits).filter(|digits| !digits.is_empty())
}

/// Why a scanned or imported code is not plausible, if it is not.
///
/// Expects an already trimmed code.
#[must_use]
pub fn code_problem(code: &str, max_length: usize) -> Option<String> {
    if code.is_empty() {
        return Some("code is empty".to_string());
    }
    if code.chars().count() > max_length {
        return Some(format!("code is longer than {max_length} characters"));
    }
    if code.chars().any(char::is_control) {
        return Some("code contains control characters".to_string());
    }
    if !code.chars().any(char::is_alphanumeric) {
        return Some("code has no letter or digit".to_string());
    }
    None
}

/// Validates a code for `field` and returns it trimmed.
pub fn validate_code<'a>(field: &str, code: &'a str, max_length: usize) -> Result<&'a str> {
    let trimmed = code.trim();
    match code_problem(trimmed, max_length) {
        Some(reason) => Err(Error::validation(field, reason)),
        None => Ok(trimmed),
    }
}

/// A product about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    /// Owning shop
    pub shop_id: i64,
    /// SKU as given
    pub sku: String,
    /// Display name
    pub name: String,
    /// Raw code, kept verbatim
    pub ean: Option<String>,
    /// Optional taxonomy group
    pub group_id: Option<i64>,
    /// Free-form attributes
    pub attributes: Option<Json>,
}

impl NewProduct {
    /// Placeholder product for a scanned code the catalog does not know.
    #[must_use]
    pub fn placeholder(shop_id: i64, code: &str) -> Self {
        Self {
            shop_id,
            sku: code.to_string(),
            name: format!("Unknown product {code}"),
            ean: Some(code.to_string()),
            group_id: None,
            attributes: None,
        }
    }

    /// Active model with the derived columns filled in.
    #[must_use]
    pub fn into_active_model(self, now: DateTime<Utc>) -> product::ActiveModel {
        let sku = self.sku.trim().to_string();
        product::ActiveModel {
            shop_id: Set(self.shop_id),
            sku_key: Set(normalize_sku(&sku)),
            sku: Set(sku),
            name: Set(self.name.trim().to_string()),
            code_digits: Set(stored_code_digits(self.ean.as_deref())),
            ean: Set(self.ean),
            attributes: Set(self.attributes),
            group_id: Set(self.group_id),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

/// Inserts a product, rejecting an empty SKU or one already used in the shop.
///
/// # Errors
/// Returns an error if:
/// - The SKU is empty or whitespace-only
/// - A product with the same normalized SKU exists (`Conflict`, `DuplicateSku`)
/// - The database insert operation fails
pub async fn create_product<C>(
    db: &C,
    new_product: NewProduct,
    now: DateTime<Utc>,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    if new_product.sku.trim().is_empty() {
        return Err(Error::validation("sku", "SKU cannot be empty"));
    }
    let sku = new_product.sku.trim().to_string();

    new_product
        .into_active_model(now)
        .insert(db)
        .await
        .map_err(|e| {
            Error::from_unique_violation(
                e,
                ConflictReason::DuplicateSku,
                &format!("SKU {sku} already exists in this shop"),
            )
        })
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id<C>(db: &C, product_id: i64) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All products of a shop, ordered by SKU.
pub async fn list_products<C>(db: &C, shop_id: i64) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::ShopId.eq(shop_id))
        .order_by_asc(product::Column::SkuKey)
        .all(db)
        .await
        .map_err(Into::into)
}
