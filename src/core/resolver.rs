//! Product code resolution.
//!
//! Turns an arbitrary scanned or typed string into zero, one or several
//! products of a shop. Stages run in order and stop at the first one that
//! matches anything:
//!
//! 1. case-insensitive SKU,
//! 2. raw code, verbatim,
//! 3. digits of the input against the digits of every raw code.
//!
//! More than one distinct match is reported as [`Resolution::Ambiguous`];
//! the resolver never picks one. Every outcome is audited.

use crate::{
    core::{context::AppContext, product},
    entities::{Product, product as product_entity},
    errors::{Error, Result},
    ports::{AuditCategory, AuditSink, audit},
};
use sea_orm::{QueryOrder, Select, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Stage that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    /// Case-insensitive SKU
    Sku,
    /// Verbatim raw code
    RawCode,
    /// Digit-only code
    Digits,
}

/// A product a code could refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Product id
    pub product_id: i64,
    /// Product SKU
    pub sku: String,
    /// Product raw code
    pub ean: Option<String>,
}

/// Several products matched and none was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    /// Input as received
    pub input: String,
    /// Digits extracted from the input
    pub digits: String,
    /// Stage that produced the matches
    pub stage: MatchStage,
    /// Every matching product, ordered by SKU
    pub candidates: Vec<Candidate>,
}

/// Outcome of resolving one code.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Exactly one product
    Found {
        /// The product
        product: product_entity::Model,
        /// Stage that matched
        stage: MatchStage,
    },
    /// Two or more products
    Ambiguous(AmbiguousMatch),
    /// Nothing matched
    NotFound {
        /// Input as received
        input: String,
    },
}

impl Resolution {
    const fn category(&self) -> AuditCategory {
        match self {
            Self::Found { .. } => AuditCategory::ResolutionFound,
            Self::Ambiguous(_) => AuditCategory::ResolutionAmbiguous,
            Self::NotFound { .. } => AuditCategory::ResolutionNotFound,
        }
    }

    fn describe(&self, shop_id: i64) -> String {
        match self {
            Self::Found { product, stage } => format!(
                "shop {shop_id}: resolved to {} (product {}) by {stage:?}",
                product.sku, product.id
            ),
            Self::Ambiguous(m) => {
                let skus: Vec<&str> = m.candidates.iter().map(|c| c.sku.as_str()).collect();
                format!(
                    "shop {shop_id}: code {:?} (digits {}) is ambiguous between {}",
                    m.input,
                    m.digits,
                    skus.join(", ")
                )
            }
            Self::NotFound { input } => format!("shop {shop_id}: code {input:?} not found"),
        }
    }
}

/// Resolves `input` for the presentation layer.
///
/// # Errors
/// Validation error for an empty input; store errors otherwise.
pub async fn resolve_product(
    ctx: &AppContext,
    shop_id: i64,
    input: &str,
    actor: &str,
) -> Result<Resolution> {
    resolve_code(&ctx.database, ctx.audit.as_ref(), shop_id, input, actor).await
}

/// Resolves `input` against the products of `shop_id` on any connection,
/// including an open transaction.
#[instrument(skip(db, sink))]
pub async fn resolve_code<C>(
    db: &C,
    sink: &dyn AuditSink,
    shop_id: i64,
    input: &str,
    actor: &str,
) -> Result<Resolution>
where
    C: ConnectionTrait,
{
    if input.trim().is_empty() {
        return Err(Error::validation("code", "code is empty"));
    }

    let resolution = run_stages(db, shop_id, input).await?;
    debug!(category = %resolution.category(), "Code resolved");
    audit::record(sink, resolution.describe(shop_id), actor, resolution.category()).await;
    Ok(resolution)
}

async fn run_stages<C>(db: &C, shop_id: i64, input: &str) -> Result<Resolution>
where
    C: ConnectionTrait,
{
    let trimmed = input.trim();
    let digits = product::code_digits(input);

    let by_sku = shop_products(shop_id)
        .filter(product_entity::Column::SkuKey.eq(product::normalize_sku(input)))
        .all(db)
        .await?;
    if !by_sku.is_empty() {
        return Ok(decide(input, &digits, MatchStage::Sku, by_sku));
    }

    let mut raw_codes = vec![input.to_string()];
    if trimmed != input {
        raw_codes.push(trimmed.to_string());
    }
    let by_raw = shop_products(shop_id)
        .filter(product_entity::Column::Ean.is_in(raw_codes))
        .all(db)
        .await?;
    if !by_raw.is_empty() {
        return Ok(decide(input, &digits, MatchStage::RawCode, by_raw));
    }

    if !digits.is_empty() {
        let by_digits = shop_products(shop_id)
            .filter(product_entity::Column::CodeDigits.eq(digits.clone()))
            .all(db)
            .await?;
        if !by_digits.is_empty() {
            return Ok(decide(input, &digits, MatchStage::Digits, by_digits));
        }
    }

    Ok(Resolution::NotFound {
        input: input.to_string(),
    })
}

fn shop_products(shop_id: i64) -> Select<Product> {
    Product::find()
        .filter(product_entity::Column::ShopId.eq(shop_id))
        .order_by_asc(product_entity::Column::SkuKey)
        .order_by_asc(product_entity::Column::Id)
}

/// One distinct product is a match; more is ambiguity.
fn decide(
    input: &str,
    digits: &str,
    stage: MatchStage,
    matches: Vec<product_entity::Model>,
) -> Resolution {
    let mut distinct: BTreeMap<i64, product_entity::Model> = BTreeMap::new();
    for product in matches {
        distinct.entry(product.id).or_insert(product);
    }

    if distinct.len() == 1 {
        if let Some((_, product)) = distinct.pop_first() {
            return Resolution::Found { product, stage };
        }
    }

    let mut candidates: Vec<Candidate> = distinct
        .into_values()
        .map(|p| Candidate {
            product_id: p.id,
            sku: p.sku,
            ean: p.ean,
        })
        .collect();
    candidates.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.product_id.cmp(&b.product_id)));

    Resolution::Ambiguous(AmbiguousMatch {
        input: input.to_string(),
        digits: digits.to_string(),
        stage,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::ports::MemoryAuditSink;
    use crate::test_utils::*;

    fn found_sku(resolution: &Resolution) -> Option<&str> {
        match resolution {
            Resolution::Found { product, .. } => Some(product.sku.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_validation_error() -> Result<()> {
        let db = setup_test_db().await?;
        let sink = MemoryAuditSink::default();

        let result = resolve_code(&db, &sink, 1, "   ", "tester").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(sink.entries().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_sku_match_is_case_insensitive() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "Cola-33", Some("5449000000996"))
            .await?;

        let resolution = resolve_product(&env.ctx, env.shop.id, "cola-33", "tester").await?;
        assert_eq!(found_sku(&resolution), Some("Cola-33"));
        assert!(matches!(
            resolution,
            Resolution::Found {
                stage: MatchStage::Sku,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_raw_code_match_keeps_embedded_whitespace() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "P-1", Some("AB 12 34")).await?;

        let resolution = resolve_product(&env.ctx, env.shop.id, "AB 12 34", "tester").await?;
        assert_eq!(found_sku(&resolution), Some("P-1"));
        assert!(matches!(
            resolution,
            Resolution::Found {
                stage: MatchStage::RawCode,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_digit_match_found_when_unique() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "P-1", Some("40-12345-67890")).await?;

        let resolution = resolve_product(&env.ctx, env.shop.id, "401234567890", "tester").await?;
        assert_eq!(found_sku(&resolution), Some("P-1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_shared_digits_are_ambiguous_but_sku_is_exact() -> Result<()> {
        let env = TestEnv::new().await?;
        let a = create_test_product(&env.ctx.database, env.shop.id, "SKU-A", Some("12 345"))
            .await?;
        let b = create_test_product(&env.ctx.database, env.shop.id, "SKU-B", Some("123-45"))
            .await?;

        let resolution = resolve_product(&env.ctx, env.shop.id, "12345", "tester").await?;
        match resolution {
            Resolution::Ambiguous(m) => {
                assert_eq!(m.input, "12345");
                assert_eq!(m.digits, "12345");
                assert_eq!(m.stage, MatchStage::Digits);
                let skus: Vec<&str> = m.candidates.iter().map(|c| c.sku.as_str()).collect();
                assert_eq!(skus, vec!["SKU-A", "SKU-B"]);
                assert_eq!(m.candidates[0].ean.as_deref(), Some("12 345"));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let resolution = resolve_product(&env.ctx, env.shop.id, "sku-a", "tester").await?;
        assert!(matches!(resolution, Resolution::Found { ref product, .. } if product.id == a.id));
        let resolution = resolve_product(&env.ctx, env.shop.id, "SKU-B", "tester").await?;
        assert!(matches!(resolution, Resolution::Found { ref product, .. } if product.id == b.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_and_other_shops_ignored() -> Result<()> {
        let env = TestEnv::new().await?;
        let other = create_test_shop(&env.ctx.database, "Other").await?;
        create_test_product(&env.ctx.database, other.id, "X-1", Some("999")).await?;

        let resolution = resolve_product(&env.ctx, env.shop.id, "999", "tester").await?;
        assert_eq!(
            resolution,
            Resolution::NotFound {
                input: "999".to_string()
            }
        );

        // Letters only: no digit stage, still a clean NotFound
        let resolution = resolve_product(&env.ctx, env.shop.id, "nothing", "tester").await?;
        assert!(matches!(resolution, Resolution::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_every_outcome_is_audited() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "A", Some("1-1")).await?;
        create_test_product(&env.ctx.database, env.shop.id, "B", Some("11")).await?;

        resolve_product(&env.ctx, env.shop.id, "a", "alice").await?;
        resolve_product(&env.ctx, env.shop.id, "1 1", "alice").await?;
        resolve_product(&env.ctx, env.shop.id, "zzz", "alice").await?;

        assert_eq!(env.audit.entries_in(AuditCategory::ResolutionFound).len(), 1);
        assert_eq!(env.audit.entries_in(AuditCategory::ResolutionAmbiguous).len(), 1);
        assert_eq!(env.audit.entries_in(AuditCategory::ResolutionNotFound).len(), 1);
        assert!(env.audit.entries().iter().all(|e| e.actor == "alice"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_audit_does_not_fail_resolution() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "A", None).await?;
        let ctx = env
            .ctx
            .clone()
            .with_audit(std::sync::Arc::new(MemoryAuditSink::failing()));

        let resolution = resolve_product(&ctx, env.shop.id, "A", "alice").await?;
        assert_eq!(found_sku(&resolution), Some("A"));
        Ok(())
    }
}
