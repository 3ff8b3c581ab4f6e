//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::{Limits, StoreCapabilities},
    core::{
        AppContext,
        product::{self, NewProduct},
    },
    entities::{location, shop, shop_user},
    errors::Result,
    ports::{FixedClock, InMemoryImportLocks, MemoryAuditSink},
};
use chrono::{TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Context over `db` with default limits and current capabilities.
pub fn context_for(db: DatabaseConnection) -> AppContext {
    AppContext::new(db, StoreCapabilities::current(), Limits::default())
}

/// A ready-to-use environment: store, deterministic collaborators, one shop
/// and one enabled zone.
pub struct TestEnv {
    /// Context wired to the collaborators below
    pub ctx: AppContext,
    /// Frozen clock, advance it explicitly
    pub clock: Arc<FixedClock>,
    /// Collected audit entries
    pub audit: Arc<MemoryAuditSink>,
    /// Import locks shared with `ctx`
    pub locks: InMemoryImportLocks,
    /// Default shop
    pub shop: shop::Model,
    /// Zone "A-01" of the default shop
    pub location: location::Model,
}

impl TestEnv {
    /// Sets up the environment.
    ///
    /// # Defaults
    /// * clock: 2024-03-01 08:00:00 UTC
    /// * shop: "Test Shop"
    /// * location: "A-01"
    pub async fn new() -> Result<Self> {
        let db = setup_test_db().await?;
        let start = Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let clock = Arc::new(FixedClock::new(start));
        let audit = Arc::new(MemoryAuditSink::default());
        let locks = InMemoryImportLocks::default();

        let shop = create_test_shop(&db, "Test Shop").await?;
        let location = create_test_location(&db, shop.id, "A-01").await?;

        let ctx = context_for(db)
            .with_clock(Arc::clone(&clock) as _)
            .with_audit(Arc::clone(&audit) as _)
            .with_import_locks(Arc::new(locks.clone()));

        Ok(Self {
            ctx,
            clock,
            audit,
            locks,
            shop,
            location,
        })
    }
}

/// Creates a shop.
pub async fn create_test_shop(db: &DatabaseConnection, name: &str) -> Result<shop::Model> {
    Ok(shop::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates an enabled zone labelled after its code.
pub async fn create_test_location(
    db: &DatabaseConnection,
    shop_id: i64,
    code: &str,
) -> Result<location::Model> {
    Ok(location::ActiveModel {
        shop_id: Set(shop_id),
        code: Set(code.to_string()),
        label: Set(format!("Zone {code}")),
        disabled: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates a disabled zone.
pub async fn create_disabled_location(
    db: &DatabaseConnection,
    shop_id: i64,
    code: &str,
) -> Result<location::Model> {
    let zone = create_test_location(db, shop_id, code).await?;
    let mut active: location::ActiveModel = zone.into();
    active.disabled = Set(true);
    Ok(active.update(db).await?)
}

/// Creates an enabled registered operator.
pub async fn create_test_user(
    db: &DatabaseConnection,
    shop_id: i64,
    display_name: &str,
) -> Result<shop_user::Model> {
    Ok(shop_user::ActiveModel {
        shop_id: Set(shop_id),
        display_name: Set(display_name.to_string()),
        disabled: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates a product named after its SKU.
pub async fn create_test_product(
    db: &DatabaseConnection,
    shop_id: i64,
    sku: &str,
    ean: Option<&str>,
) -> Result<crate::entities::product::Model> {
    product::create_product(
        db,
        NewProduct {
            shop_id,
            sku: sku.to_string(),
            name: format!("Product {}", sku.trim()),
            ean: ean.map(ToString::to_string),
            group_id: None,
            attributes: None,
        },
        Utc::now(),
    )
    .await
}
