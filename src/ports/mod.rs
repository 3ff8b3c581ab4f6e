//! Collaborator ports - the injectable services the core consumes besides the
//! store: a time source, an audit sink and the per-shop import lock.

/// Audit sink trait and implementations
pub mod audit;
/// Injectable current-time source
pub mod clock;
/// Non-blocking per-shop import lock
pub mod lock;

pub use audit::{AuditCategory, AuditEntry, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use lock::{ImportLockGuard, ImportLockProvider, InMemoryImportLocks};
