//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod catalog_import;
pub mod conflict;
pub mod count_line;
pub mod counting_run;
pub mod inventory_session;
pub mod location;
pub mod product;
pub mod product_group;
pub mod shop;
pub mod shop_user;

// Re-export specific types to avoid conflicts
pub use catalog_import::{Entity as CatalogImport, Model as CatalogImportModel};
pub use conflict::{Entity as Conflict, Model as ConflictModel};
pub use count_line::{Entity as CountLine, Model as CountLineModel};
pub use counting_run::{Entity as CountingRun, Model as CountingRunModel};
pub use inventory_session::{Entity as InventorySession, Model as InventorySessionModel};
pub use location::{Entity as Location, Model as LocationModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_group::{Entity as ProductGroup, Model as ProductGroupModel};
pub use shop::{Entity as Shop, Model as ShopModel};
pub use shop_user::{Entity as ShopUser, Model as ShopUserModel};
