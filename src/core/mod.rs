//! Core business logic - framework-agnostic stock-taking operations.
//!
//! Every operation takes an [`AppContext`] (or, for helpers usable inside a
//! transaction, any `ConnectionTrait`) and returns [`crate::errors::Result`].

/// Catalog file parsing and row validation
pub mod catalog_file;
/// Per-shop catalog import coordination
pub mod catalog_import;
/// Conflict detection and reconciliation
pub mod conflicts;
/// Application context shared by all operations
pub mod context;
/// Operator identity of a counting run
pub mod operator;
/// Product normalization rules and catalog rows
pub mod product;
/// Product code resolution
pub mod resolver;
/// Counting run lifecycle
pub mod runs;

pub use context::AppContext;
pub use operator::OperatorIdentity;
