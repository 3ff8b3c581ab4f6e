//! Database configuration module.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`;
//! the uniqueness rules the core relies on (case-insensitive keys and the
//! partial "one open run" index) cannot be expressed on the entities and are
//! created afterwards with raw SQL.

use crate::entities::{
    CatalogImport, Conflict, CountLine, CountingRun, InventorySession, Location, Product,
    ProductGroup, Shop, ShopUser,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Schema, Statement};
use tracing::info;

/// Default database location when neither the environment nor the config
/// file names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/stocktake.sqlite?mode=rwc";

/// Indexes that enforce the store-level invariants.
const UNIQUE_INDEXES: [&str; 5] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_products_shop_sku \
     ON products (shop_id, sku_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_locations_shop_code \
     ON locations (shop_id, lower(code))",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_count_lines_run_product \
     ON count_lines (run_id, product_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_catalog_imports_shop \
     ON catalog_imports (shop_id)",
    // Scoped to open runs only: completed runs may repeat the tuple freely.
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_counting_runs_open \
     ON counting_runs (session_id, location_id, count_type, \
     coalesce(operator_name, ''), coalesce(shop_user_id, 0)) \
     WHERE completed_at IS NULL",
];

/// Nullable columns missing from first-version stores: (table, column, definition).
const ADDED_COLUMNS: [(&str, &str, &str); 2] = [
    (
        "counting_runs",
        "shop_user_id",
        "INTEGER REFERENCES shop_users (id)",
    ),
    (
        "products",
        "group_id",
        "INTEGER REFERENCES product_groups (id)",
    ),
];

/// Lookup indexes for the hot read paths.
const LOOKUP_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS ix_products_shop_digits ON products (shop_id, code_digits)",
    "CREATE INDEX IF NOT EXISTS ix_products_shop_ean ON products (shop_id, ean)",
    "CREATE INDEX IF NOT EXISTS ix_counting_runs_location \
     ON counting_runs (location_id, count_type, completed_at)",
];

/// Gets the database URL from the `DATABASE_URL` environment variable, then
/// the configured value, then the default local `SQLite` file.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(ToString::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates every table and index if missing, and adds the columns a
/// first-version store lacks.
///
/// Safe to call on an existing store. The entities select every column, so a
/// legacy store must go through this before any run or product query.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Parents before children so foreign keys resolve on every backend
    let statements = [
        schema.create_table_from_entity(Shop),
        schema.create_table_from_entity(Location),
        schema.create_table_from_entity(ShopUser),
        schema.create_table_from_entity(ProductGroup),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(InventorySession),
        schema.create_table_from_entity(CountingRun),
        schema.create_table_from_entity(CountLine),
        schema.create_table_from_entity(Conflict),
        schema.create_table_from_entity(CatalogImport),
    ];

    for mut statement in statements {
        statement.if_not_exists();
        db.execute(builder.build(&statement)).await?;
    }

    if builder == DatabaseBackend::Sqlite {
        add_missing_columns(db).await?;
    }

    for sql in UNIQUE_INDEXES.iter().chain(LOOKUP_INDEXES.iter()) {
        db.execute_unprepared(sql).await?;
    }

    info!("Schema ready");
    Ok(())
}

async fn add_missing_columns(db: &DatabaseConnection) -> Result<()> {
    for (table, column, definition) in ADDED_COLUMNS {
        let rows = db
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                format!("SELECT name FROM pragma_table_info('{table}')"),
            ))
            .await?;
        let present = rows
            .iter()
            .any(|row| row.try_get::<String>("", "name").is_ok_and(|name| name == column));
        if !present {
            db.execute_unprepared(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))
                .await?;
            info!(table, column, "Upgraded legacy table");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreCapabilities;
    use crate::entities::{ConflictModel, CountingRunModel, ProductModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<ProductModel> = Product::find().limit(1).all(&db).await?;
        let _: Vec<CountingRunModel> = CountingRun::find().limit(1).all(&db).await?;
        let _: Vec<ConflictModel> = Conflict::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_upgrades_legacy_store() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute_unprepared(
            "CREATE TABLE products (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             shop_id INTEGER NOT NULL, sku TEXT NOT NULL, sku_key TEXT NOT NULL, \
             name TEXT NOT NULL, ean TEXT, code_digits TEXT, attributes TEXT, \
             created_at TEXT NOT NULL)",
        )
        .await?;
        db.execute_unprepared(
            "CREATE TABLE counting_runs (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             session_id INTEGER NOT NULL, location_id INTEGER NOT NULL, \
             count_type INTEGER NOT NULL, started_at TEXT NOT NULL, \
             completed_at TEXT, operator_name TEXT)",
        )
        .await?;
        assert_eq!(
            StoreCapabilities::detect(&db).await?,
            StoreCapabilities::legacy()
        );

        create_tables(&db).await?;
        assert_eq!(
            StoreCapabilities::detect(&db).await?,
            StoreCapabilities::current()
        );

        let shop = crate::test_utils::create_test_shop(&db, "Legacy").await?;
        crate::test_utils::create_test_product(&db, shop.id, "A-1", Some("123")).await?;
        let products: Vec<ProductModel> = Product::find().all(&db).await?;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].group_id, None);
        let _: Vec<CountingRunModel> = CountingRun::find().all(&db).await?;
        Ok(())
    }

    #[test]
    fn test_configured_url_used_when_env_missing() {
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(get_database_url(Some("sqlite::memory:")), "sqlite::memory:");
            assert_eq!(get_database_url(None), DEFAULT_DATABASE_URL);
        }
    }
}
