//! Catalog import coordination.
//!
//! One import per shop at a time: the per-shop lock is taken first and held
//! by a guard for the whole call, so it is released on every exit path. An
//! identical re-submission (same content hash as the shop's last import) is
//! skipped. Writes happen in one transaction; a dry run performs the same
//! validation and reads and reports the same statistics, but writes nothing.

use crate::{
    core::{
        catalog_file::{self, CatalogRow, RowError},
        context::AppContext,
        product::{NewProduct, normalize_sku},
    },
    entities::{
        CatalogImport, CountLine, Product, ProductGroup, Shop, catalog_import, count_line,
        product, product_group,
    },
    errors::{ConflictReason, Error, Result},
    ports::{AuditCategory, audit},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, JoinType, QuerySelect, RelationTrait, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Rows per `INSERT` statement.
const INSERT_CHUNK: usize = 500;

/// How parsed rows are applied to the shop's catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Delete every product of the shop, then insert the file
    Replace,
    /// Insert rows whose SKU is new; leave existing products untouched
    #[default]
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => f.write_str("replace"),
            Self::Merge => f.write_str("merge"),
        }
    }
}

/// An uploaded catalog file and how to apply it.
#[derive(Debug, Clone)]
pub struct CatalogUpload {
    /// Target shop
    pub shop_id: i64,
    /// Raw file content
    pub content: Vec<u8>,
    /// Replace or merge
    pub mode: ImportMode,
    /// Validate and report without writing
    pub dry_run: bool,
    /// Who uploaded the file
    pub actor: String,
}

/// Statistics of an import, identical for a dry run and a real one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Same content as the shop's last import; nothing was done
    pub skipped: bool,
    /// Nothing was written
    pub dry_run: bool,
    /// Mode requested
    pub mode: ImportMode,
    /// Non-blank data rows in the file
    pub total_rows: usize,
    /// Rows inserted as new products
    pub inserted: usize,
    /// Replace mode: rows whose SKU existed before the replace
    pub updated: usize,
    /// Merge mode: rows left alone because the SKU exists
    pub unchanged: usize,
    /// Replace mode: products deleted
    pub deleted: usize,
    /// Products the file creates or recreates
    pub would_insert: usize,
    /// Rejected rows
    pub errors: Vec<RowError>,
    /// Headers mapped to no known field
    pub unmapped_columns: Vec<String>,
    /// Group names not yet known for the shop
    pub new_groups: Vec<String>,
    /// Sub-group names not yet known under their group
    pub new_sub_groups: Vec<String>,
    /// Hex SHA-256 of the file
    pub file_hash: String,
}

impl ImportReport {
    fn skipped(upload: &CatalogUpload, file_hash: String) -> Self {
        Self {
            skipped: true,
            dry_run: upload.dry_run,
            mode: upload.mode,
            total_rows: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            deleted: 0,
            would_insert: 0,
            errors: Vec::new(),
            unmapped_columns: Vec::new(),
            new_groups: Vec::new(),
            new_sub_groups: Vec::new(),
            file_hash,
        }
    }
}

/// Hex SHA-256 of `content`.
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Imports a catalog file into a shop.
///
/// # Errors
/// - Conflict (`ImportLocked`): another import of the shop is running
/// - Validation (`file`): empty, oversized, unreadable, or without a valid row
/// - Validation (`sku`): no SKU column
/// - `NotFound`: shop missing
/// - Conflict (`CatalogLocked`): Replace while counts reference the catalog
#[instrument(skip(ctx, upload), fields(shop_id = upload.shop_id, mode = %upload.mode, dry_run = upload.dry_run, bytes = upload.content.len()))]
pub async fn import_catalog(ctx: &AppContext, upload: CatalogUpload) -> Result<ImportReport> {
    let Some(_guard) = ctx.import_locks.try_acquire(upload.shop_id) else {
        warn!("Import refused: another import is running");
        return Err(Error::conflict(
            ConflictReason::ImportLocked,
            format!("an import is already running for shop {}", upload.shop_id),
        ));
    };

    if upload.content.is_empty() {
        return Err(Error::validation("file", "catalog file is empty"));
    }
    if upload.content.len() > ctx.limits.max_import_bytes {
        return Err(Error::validation(
            "file",
            format!(
                "catalog file is {} bytes, limit is {}",
                upload.content.len(),
                ctx.limits.max_import_bytes
            ),
        ));
    }

    let db = &ctx.database;
    Shop::find_by_id(upload.shop_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("shop", upload.shop_id))?;

    let file_hash = content_hash(&upload.content);
    let previous = CatalogImport::find()
        .filter(catalog_import::Column::ShopId.eq(upload.shop_id))
        .one(db)
        .await?;
    if previous.as_ref().is_some_and(|p| p.file_hash == file_hash) {
        info!(%file_hash, "Catalog unchanged since last import, skipping");
        return Ok(ImportReport::skipped(&upload, file_hash));
    }

    let parsed = catalog_file::parse_catalog(&upload.content, ctx.limits.max_code_length)?;
    debug!(
        rows = parsed.rows.len(),
        errors = parsed.errors.len(),
        "Catalog parsed"
    );
    if parsed.rows.is_empty() {
        return Err(Error::validation(
            "file",
            format!(
                "catalog has no valid row ({} rejected)",
                parsed.errors.len()
            ),
        ));
    }

    let txn = db.begin().await?;

    if upload.mode == ImportMode::Replace && catalog_is_counted(&txn, upload.shop_id).await? {
        warn!("Replace refused: counts reference the catalog");
        return Err(Error::conflict(
            ConflictReason::CatalogLocked,
            format!(
                "shop {} already has counted lines; use merge mode instead",
                upload.shop_id
            ),
        ));
    }

    let existing: HashSet<String> = Product::find()
        .select_only()
        .column(product::Column::SkuKey)
        .filter(product::Column::ShopId.eq(upload.shop_id))
        .into_tuple::<String>()
        .all(&txn)
        .await?
        .into_iter()
        .collect();

    let mut report = ImportReport {
        skipped: false,
        dry_run: upload.dry_run,
        mode: upload.mode,
        total_rows: parsed.total_rows,
        inserted: 0,
        updated: 0,
        unchanged: 0,
        deleted: 0,
        would_insert: 0,
        errors: parsed.errors,
        unmapped_columns: parsed.unmapped_columns,
        new_groups: Vec::new(),
        new_sub_groups: Vec::new(),
        file_hash,
    };

    let to_insert: Vec<&CatalogRow> = match upload.mode {
        ImportMode::Replace => {
            report.deleted = existing.len();
            report.updated = parsed
                .rows
                .iter()
                .filter(|row| existing.contains(&normalize_sku(&row.sku)))
                .count();
            report.inserted = parsed.rows.len() - report.updated;
            parsed.rows.iter().collect()
        }
        ImportMode::Merge => {
            let (known, new): (Vec<&CatalogRow>, Vec<&CatalogRow>) = parsed
                .rows
                .iter()
                .partition(|row| existing.contains(&normalize_sku(&row.sku)));
            report.unchanged = known.len();
            report.inserted = new.len();
            new
        }
    };
    report.would_insert = report.inserted + report.updated;

    let mut taxonomy = Taxonomy::load(&txn, upload.shop_id).await?;
    let (new_groups, new_sub_groups) = taxonomy.discover(&parsed.rows);
    report.new_groups = new_groups;
    report.new_sub_groups = new_sub_groups;

    if upload.dry_run {
        // Read-only so far; the transaction rolls back on drop
        info!(would_insert = report.would_insert, errors = report.errors.len(), "Dry run complete");
        return Ok(report);
    }

    let now = ctx.clock.now();
    if ctx.capabilities.product_groups {
        taxonomy.persist(&txn, upload.shop_id, &to_insert).await?;
    }

    if upload.mode == ImportMode::Replace {
        Product::delete_many()
            .filter(product::Column::ShopId.eq(upload.shop_id))
            .exec(&txn)
            .await?;
    }

    for chunk in to_insert.chunks(INSERT_CHUNK) {
        let models = chunk.iter().map(|row| {
            let group_id = if ctx.capabilities.product_groups {
                taxonomy.group_for(row)
            } else {
                None
            };
            new_product(upload.shop_id, row, group_id).into_active_model(now)
        });
        Product::insert_many(models).exec(&txn).await?;
    }

    record_import(&txn, previous, upload.shop_id, &report.file_hash, parsed.rows.len(), now)
        .await?;
    txn.commit().await?;

    info!(
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        deleted = report.deleted,
        errors = report.errors.len(),
        "Catalog imported"
    );
    audit::record(
        ctx.audit.as_ref(),
        format!(
            "shop {}: {} import of {} rows ({} inserted, {} updated, {} unchanged, {} deleted, {} rejected)",
            upload.shop_id,
            upload.mode,
            report.total_rows,
            report.inserted,
            report.updated,
            report.unchanged,
            report.deleted,
            report.errors.len()
        ),
        &upload.actor,
        AuditCategory::CatalogImport,
    )
    .await;
    Ok(report)
}

/// Whether any count line references a product of the shop.
async fn catalog_is_counted(txn: &DatabaseTransaction, shop_id: i64) -> Result<bool> {
    let counted = CountLine::find()
        .join(JoinType::InnerJoin, count_line::Relation::Product.def())
        .filter(product::Column::ShopId.eq(shop_id))
        .count(txn)
        .await?;
    Ok(counted > 0)
}

fn new_product(shop_id: i64, row: &CatalogRow, group_id: Option<i64>) -> NewProduct {
    let attributes = if row.attributes.is_empty() {
        None
    } else {
        Some(Json::Object(
            row.attributes
                .iter()
                .map(|(key, value)| (key.clone(), Json::String(value.clone())))
                .collect(),
        ))
    };
    NewProduct {
        shop_id,
        sku: row.sku.clone(),
        name: row.name.clone(),
        ean: row.ean.clone(),
        group_id,
        attributes,
    }
}

async fn record_import(
    txn: &DatabaseTransaction,
    previous: Option<catalog_import::Model>,
    shop_id: i64,
    file_hash: &str,
    row_count: usize,
    now: DateTime<Utc>,
) -> Result<()> {
    let row_count = i64::try_from(row_count).unwrap_or(i64::MAX);
    match previous {
        Some(previous) => {
            let mut active: catalog_import::ActiveModel = previous.into();
            active.file_hash = Set(file_hash.to_string());
            active.row_count = Set(row_count);
            active.imported_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            catalog_import::ActiveModel {
                shop_id: Set(shop_id),
                file_hash: Set(file_hash.to_string()),
                row_count: Set(row_count),
                imported_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

/// Groups of a shop keyed by lowercased name, top-level and per parent.
#[derive(Debug, Default)]
struct Taxonomy {
    groups: HashMap<String, i64>,
    sub_groups: HashMap<(i64, String), i64>,
}

fn group_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Taxonomy {
    async fn load(txn: &DatabaseTransaction, shop_id: i64) -> Result<Self> {
        let all = ProductGroup::find()
            .filter(product_group::Column::ShopId.eq(shop_id))
            .all(txn)
            .await?;
        let mut taxonomy = Self::default();
        for group in all {
            match group.parent_id {
                None => {
                    taxonomy.groups.insert(group_key(&group.name), group.id);
                }
                Some(parent) => {
                    taxonomy
                        .sub_groups
                        .insert((parent, group_key(&group.name)), group.id);
                }
            }
        }
        Ok(taxonomy)
    }

    /// New group and sub-group names in `rows`, sorted, first spelling kept.
    fn discover(&self, rows: &[CatalogRow]) -> (Vec<String>, Vec<String>) {
        let mut seen_groups = HashSet::new();
        let mut seen_subs = HashSet::new();
        let mut new_groups = BTreeSet::new();
        let mut new_subs = BTreeSet::new();

        for row in rows {
            let Some(group) = row.group.as_deref() else {
                continue;
            };
            let key = group_key(group);
            let parent = self.groups.get(&key).copied();
            if parent.is_none() && seen_groups.insert(key.clone()) {
                new_groups.insert(group.to_string());
            }
            if let Some(sub) = row.sub_group.as_deref() {
                let known = parent.is_some_and(|id| self.sub_groups.contains_key(&(id, group_key(sub))));
                if !known && seen_subs.insert((key, group_key(sub))) {
                    new_subs.insert(sub.to_string());
                }
            }
        }
        (new_groups.into_iter().collect(), new_subs.into_iter().collect())
    }

    /// Creates the groups `rows` reference and records their ids.
    async fn persist(
        &mut self,
        txn: &DatabaseTransaction,
        shop_id: i64,
        rows: &[&CatalogRow],
    ) -> Result<()> {
        for row in rows {
            let Some(group) = row.group.as_deref() else {
                continue;
            };
            let parent = match self.groups.get(&group_key(group)) {
                Some(id) => *id,
                None => {
                    let id = insert_group(txn, shop_id, group, None).await?;
                    self.groups.insert(group_key(group), id);
                    id
                }
            };
            if let Some(sub) = row.sub_group.as_deref() {
                let key = (parent, group_key(sub));
                if !self.sub_groups.contains_key(&key) {
                    let id = insert_group(txn, shop_id, sub, Some(parent)).await?;
                    self.sub_groups.insert(key, id);
                }
            }
        }
        Ok(())
    }

    /// Most specific known group of a row.
    fn group_for(&self, row: &CatalogRow) -> Option<i64> {
        let parent = *self.groups.get(&group_key(row.group.as_deref()?))?;
        row.sub_group
            .as_deref()
            .and_then(|sub| self.sub_groups.get(&(parent, group_key(sub))).copied())
            .or(Some(parent))
    }
}

async fn insert_group(
    txn: &DatabaseTransaction,
    shop_id: i64,
    name: &str,
    parent_id: Option<i64>,
) -> Result<i64> {
    let group = product_group::ActiveModel {
        shop_id: Set(shop_id),
        name: Set(name.trim().to_string()),
        parent_id: Set(parent_id),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    debug!(group_id = group.id, name, "Product group created");
    Ok(group.id)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::{Limits, StoreCapabilities};
    use crate::core::operator::OperatorIdentity;
    use crate::core::product::list_products;
    use crate::core::runs::{RunTarget, ScanItem, complete_run};
    use crate::ports::ImportLockProvider;
    use crate::test_utils::*;

    const CATALOG: &str = "sku;ean;name;famille;sous_famille;couleur\n\
                           A-1;3017620422003;Spread;Food;Sweet;brown\n\
                           B-2;5449000000996;Cola;Drinks;Soda;\n\
                           C-3;;Water;Drinks;;\n";

    fn upload(env: &TestEnv, content: &str, mode: ImportMode, dry_run: bool) -> CatalogUpload {
        CatalogUpload {
            shop_id: env.shop.id,
            content: content.as_bytes().to_vec(),
            mode,
            dry_run,
            actor: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_the_store() -> Result<()> {
        let mut ctx = context_for(setup_test_db().await?);
        ctx.limits = Limits {
            max_import_bytes: 8,
            ..Limits::default()
        };
        let result = import_catalog(
            &ctx,
            CatalogUpload {
                shop_id: 1,
                content: b"sku\nA-1\nB-2\n".to_vec(),
                mode: ImportMode::Merge,
                dry_run: true,
                actor: "admin".to_string(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "file"));
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_import_and_skip_resubmission() -> Result<()> {
        let env = TestEnv::new().await?;

        let report = import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Merge, false)).await?;
        assert!(!report.skipped);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.would_insert, 3);
        assert_eq!(report.unmapped_columns, vec!["couleur".to_string()]);
        assert_eq!(report.new_groups, vec!["Drinks".to_string(), "Food".to_string()]);
        assert_eq!(report.new_sub_groups, vec!["Soda".to_string(), "Sweet".to_string()]);
        assert_eq!(report.file_hash, content_hash(CATALOG.as_bytes()));

        let products = list_products(&env.ctx.database, env.shop.id).await?;
        assert_eq!(products.len(), 3);
        let spread = &products[0];
        assert_eq!(spread.code_digits.as_deref(), Some("3017620422003"));
        assert_eq!(
            spread.attributes,
            Some(serde_json::json!({ "couleur": "brown" }))
        );
        let sweet = ProductGroup::find_by_id(spread.group_id.unwrap())
            .one(&env.ctx.database)
            .await?
            .unwrap();
        assert_eq!(sweet.name, "Sweet");
        assert!(sweet.parent_id.is_some());
        assert_eq!(ProductGroup::find().count(&env.ctx.database).await?, 4);

        // Identical file: no-op
        let again = import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Replace, false)).await?;
        assert!(again.skipped);
        assert_eq!(again.inserted, 0);
        assert!(again.errors.is_empty());
        assert_eq!(list_products(&env.ctx.database, env.shop.id).await?.len(), 3);

        let audited = env.audit.entries_in(AuditCategory::CatalogImport);
        assert_eq!(audited.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_keeps_existing_products() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "a-1", Some("999")).await?;

        let report = import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Merge, false)).await?;
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.updated, 0);

        let products = list_products(&env.ctx.database, env.shop.id).await?;
        assert_eq!(products.len(), 3);
        // Untouched: still the original code
        assert_eq!(products[0].ean.as_deref(), Some("999"));
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_counts_and_lock_rule() -> Result<()> {
        let env = TestEnv::new().await?;
        create_test_product(&env.ctx.database, env.shop.id, "A-1", None).await?;
        create_test_product(&env.ctx.database, env.shop.id, "OLD", None).await?;

        let report = import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Replace, false)).await?;
        assert_eq!(report.deleted, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.would_insert, 3);
        let skus: Vec<String> = list_products(&env.ctx.database, env.shop.id)
            .await?
            .into_iter()
            .map(|p| p.sku)
            .collect();
        assert_eq!(skus, vec!["A-1", "B-2", "C-3"]);

        // Once a count references the catalog, replace is refused but merge is not
        complete_run(
            &env.ctx,
            &RunTarget::Zone {
                location_id: env.location.id,
                operator: OperatorIdentity::legacy("alice"),
            },
            1,
            &[ScanItem::new("B-2", 1.0)],
        )
        .await?;

        let changed = format!("{CATALOG}D-4;123;Juice;Drinks;;\n");
        for dry_run in [true, false] {
            let result =
                import_catalog(&env.ctx, upload(&env, &changed, ImportMode::Replace, dry_run)).await;
            assert!(matches!(
                result,
                Err(Error::Conflict {
                    reason: ConflictReason::CatalogLocked,
                    ..
                })
            ));
        }
        let merged = import_catalog(&env.ctx, upload(&env, &changed, ImportMode::Merge, false)).await?;
        assert_eq!(merged.inserted, 1);
        assert_eq!(merged.unchanged, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_in_other_shop_is_not_locked() -> Result<()> {
        let env = TestEnv::new().await?;
        complete_run(
            &env.ctx,
            &RunTarget::Zone {
                location_id: env.location.id,
                operator: OperatorIdentity::legacy("alice"),
            },
            1,
            &[ScanItem::new("123", 1.0)],
        )
        .await?;

        let other = create_test_shop(&env.ctx.database, "Other").await?;
        let mut request = upload(&env, CATALOG, ImportMode::Replace, false);
        request.shop_id = other.id;
        let report = import_catalog(&env.ctx, request).await?;
        assert_eq!(report.inserted, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() -> Result<()> {
        let env = TestEnv::new().await?;
        let content = format!("{CATALOG}A-1;111;Duplicate;;;\n");

        let report = import_catalog(&env.ctx, upload(&env, &content, ImportMode::Replace, true)).await?;
        assert!(report.dry_run);
        assert_eq!(report.would_insert, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].reason.contains("duplicate"));
        assert_eq!(report.new_groups.len(), 2);

        assert_eq!(Product::find().count(&env.ctx.database).await?, 0);
        assert_eq!(ProductGroup::find().count(&env.ctx.database).await?, 0);
        assert_eq!(CatalogImport::find().count(&env.ctx.database).await?, 0);

        // Not recorded, so the real import is not skipped
        let real = import_catalog(&env.ctx, upload(&env, &content, ImportMode::Replace, false)).await?;
        assert!(!real.skipped);
        assert_eq!(real.inserted, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_released() -> Result<()> {
        let env = TestEnv::new().await?;

        let held = env.locks.try_acquire(env.shop.id).unwrap();
        let result = import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Merge, false)).await;
        assert!(matches!(
            result,
            Err(Error::Conflict {
                reason: ConflictReason::ImportLocked,
                ..
            })
        ));
        drop(held);

        // Released after a failing import
        let result = import_catalog(&env.ctx, upload(&env, "ean\n123\n", ImportMode::Merge, false)).await;
        assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "sku"));
        assert!(!env.locks.is_locked(env.shop.id));

        let result = import_catalog(&env.ctx, upload(&env, "sku\n\n", ImportMode::Merge, false)).await;
        assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "file"));
        assert!(!env.locks.is_locked(env.shop.id));

        import_catalog(&env.ctx, upload(&env, CATALOG, ImportMode::Merge, false)).await?;
        assert!(!env.locks.is_locked(env.shop.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_shop() -> Result<()> {
        let env = TestEnv::new().await?;
        let mut request = upload(&env, CATALOG, ImportMode::Merge, false);
        request.shop_id = 999;
        let result = import_catalog(&env.ctx, request).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "shop", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_groups_not_persisted_without_capability() -> Result<()> {
        let env = TestEnv::new().await?;
        let ctx = env.ctx.clone().with_capabilities(StoreCapabilities {
            product_groups: false,
            ..StoreCapabilities::current()
        });

        let report = import_catalog(&ctx, upload(&env, CATALOG, ImportMode::Merge, false)).await?;
        assert_eq!(report.new_groups.len(), 2);
        assert_eq!(ProductGroup::find().count(&ctx.database).await?, 0);
        let products = list_products(&ctx.database, env.shop.id).await?;
        assert!(products.iter().all(|p| p.group_id.is_none()));
        Ok(())
    }
}
