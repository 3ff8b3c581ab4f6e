//! Audit sink - fire-and-forget record of operationally significant events.
//!
//! Callers go through [`record`], which logs a failing sink at `warn` and never
//! lets the failure reach the primary operation.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use tracing::{info, warn};

/// Outcome category of an audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    /// Code resolved to exactly one product
    ResolutionFound,
    /// Code matched several products by digits
    ResolutionAmbiguous,
    /// Code matched nothing
    ResolutionNotFound,
    /// Run started, completed, released or force-restarted
    RunLifecycle,
    /// Catalog import outcome
    CatalogImport,
    /// Conflict raised or resolved
    ConflictResolution,
}

impl AuditCategory {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolutionFound => "product_resolution.found",
            Self::ResolutionAmbiguous => "product_resolution.ambiguous",
            Self::ResolutionNotFound => "product_resolution.not_found",
            Self::RunLifecycle => "run_lifecycle",
            Self::CatalogImport => "catalog_import",
            Self::ConflictResolution => "conflict_resolution",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Human-readable description
    pub message: String,
    /// Who triggered it
    pub actor: String,
    /// Outcome category
    pub category: AuditCategory,
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Stores one entry.
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Records `entry`, swallowing and logging any sink failure.
pub async fn record(
    sink: &dyn AuditSink,
    message: impl Into<String>,
    actor: &str,
    category: AuditCategory,
) {
    let entry = AuditEntry {
        message: message.into(),
        actor: actor.to_string(),
        category,
    };
    if let Err(e) = sink.record(entry).await {
        warn!(%category, actor, "Audit sink failed: {}", e);
    }
}

/// Emits entries as structured `tracing` events on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        info!(
            target: "audit",
            category = %entry.category,
            actor = %entry.actor,
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Keeps entries in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failing: bool,
}

impl MemoryAuditSink {
    /// A sink that rejects every entry.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            entries: Mutex::default(),
            failing: true,
        }
    }

    /// Snapshot of the recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Entries of one category.
    #[must_use]
    pub fn entries_in(&self, category: AuditCategory) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        if self.failing {
            return Err(Error::Config {
                message: "audit sink unavailable".to_string(),
            });
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_collects_entries() {
        let sink = MemoryAuditSink::default();
        record(&sink, "scan 123", "alice", AuditCategory::ResolutionNotFound).await;

        let entries = sink.entries_in(AuditCategory::ResolutionNotFound);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "alice");
        assert_eq!(entries[0].message, "scan 123");
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let sink = MemoryAuditSink::failing();
        // Must not panic or propagate
        record(&sink, "anything", "bob", AuditCategory::RunLifecycle).await;
        assert!(sink.entries().is_empty());
    }
}
