//! Store capability descriptor.
//!
//! Optional parts of the schema are detected once when the process starts and
//! the result travels with the application context. Nothing re-inspects the
//! schema per call.

use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use std::collections::HashSet;
use tracing::info;

/// Schema version this crate creates.
pub const SCHEMA_VERSION: u32 = 2;

/// What the connected store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// 1 for stores predating registered operators and product groups
    pub schema_version: u32,
    /// `counting_runs.shop_user_id` and the `shop_users` table exist
    pub registered_operators: bool,
    /// `products.group_id` and the `product_groups` table exist
    pub product_groups: bool,
}

impl StoreCapabilities {
    /// A store created by [`crate::config::database::create_tables`].
    #[must_use]
    pub const fn current() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            registered_operators: true,
            product_groups: true,
        }
    }

    /// A store with only the original columns.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            schema_version: 1,
            registered_operators: false,
            product_groups: false,
        }
    }

    /// Inspects the connected store. Non-`SQLite` backends are assumed current.
    ///
    /// A legacy result describes a store that
    /// [`crate::config::database::create_tables`] has not upgraded yet; the
    /// entities cannot query it until it has.
    pub async fn detect(db: &DatabaseConnection) -> Result<Self> {
        let backend = db.get_database_backend();
        if backend != DatabaseBackend::Sqlite {
            return Ok(Self::current());
        }

        let tables = names(db, "SELECT name FROM sqlite_master WHERE type = 'table'").await?;
        let run_columns = names(db, "SELECT name FROM pragma_table_info('counting_runs')").await?;
        let product_columns = names(db, "SELECT name FROM pragma_table_info('products')").await?;

        let registered_operators =
            tables.contains("shop_users") && run_columns.contains("shop_user_id");
        let product_groups =
            tables.contains("product_groups") && product_columns.contains("group_id");

        let capabilities = Self {
            schema_version: if registered_operators && product_groups {
                SCHEMA_VERSION
            } else {
                1
            },
            registered_operators,
            product_groups,
        };
        info!(?capabilities, "Store capabilities detected");
        Ok(capabilities)
    }
}

async fn names(db: &DatabaseConnection, sql: &str) -> Result<HashSet<String>> {
    let rows = db
        .query_all(Statement::from_string(DatabaseBackend::Sqlite, sql))
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String>("", "name").map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_detect_current_schema() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        crate::config::database::create_tables(&db).await?;

        let capabilities = StoreCapabilities::detect(&db).await?;
        assert_eq!(capabilities, StoreCapabilities::current());
        Ok(())
    }

    #[tokio::test]
    async fn test_detect_legacy_schema() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute_unprepared(
            "CREATE TABLE counting_runs (id INTEGER PRIMARY KEY, operator_name TEXT)",
        )
        .await?;
        db.execute_unprepared("CREATE TABLE products (id INTEGER PRIMARY KEY, sku TEXT)")
            .await?;

        let capabilities = StoreCapabilities::detect(&db).await?;
        assert_eq!(capabilities, StoreCapabilities::legacy());
        Ok(())
    }
}
