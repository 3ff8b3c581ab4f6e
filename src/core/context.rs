//! Application context shared by every core operation.

use crate::config::{Limits, StoreCapabilities};
use crate::ports::{
    AuditSink, Clock, ImportLockProvider, InMemoryImportLocks, SystemClock, TracingAuditSink,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Store handle plus the collaborators the core consumes.
///
/// Built once at startup; `capabilities` is never re-detected afterwards.
#[derive(Clone)]
pub struct AppContext {
    /// Transactional store
    pub database: DatabaseConnection,
    /// Source of every written timestamp
    pub clock: Arc<dyn Clock>,
    /// Audit destination
    pub audit: Arc<dyn AuditSink>,
    /// Per-shop import lock
    pub import_locks: Arc<dyn ImportLockProvider>,
    /// What the connected store supports
    pub capabilities: StoreCapabilities,
    /// Validation ceilings
    pub limits: Limits,
}

impl AppContext {
    /// Context with the wall clock, tracing audit sink and in-process locks.
    #[must_use]
    pub fn new(database: DatabaseConnection, capabilities: StoreCapabilities, limits: Limits) -> Self {
        Self {
            database,
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
            import_locks: Arc::new(InMemoryImportLocks::default()),
            capabilities,
            limits,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the import lock provider.
    #[must_use]
    pub fn with_import_locks(mut self, import_locks: Arc<dyn ImportLockProvider>) -> Self {
        self.import_locks = import_locks;
        self
    }

    /// Replaces the capability descriptor.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
