//! Audit trail boundary
//!
//! The framework does not own audit storage; records flow through an
//! injected [`AuditSink`]. A record is a tagged structure with a fixed set
//! of required fields plus an open metadata map, leaving the storage schema
//! to the sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use warden_types::{AgentId, ErrorClassification, ErrorId, RecoveryApproach};

use crate::error::WardenResult;

/// One audit entry describing a handled failure or recovery action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the record was created.
    pub timestamp: DateTime<Utc>,

    /// Operation the record describes (e.g. "handle_error").
    pub operation: String,

    /// The failure occurrence this record belongs to.
    pub error_id: ErrorId,

    /// Agent that reported the failure.
    pub agent_id: AgentId,

    /// Classification, when error details are logged.
    pub classification: Option<ErrorClassification>,

    /// Recovery approach taken, when recovery actions are logged.
    pub recovery_approach: Option<RecoveryApproach>,

    /// Whether the handling succeeded.
    pub success: bool,

    /// Open metadata map.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditRecord {
    /// Create a record for the given operation and occurrence.
    pub fn new(operation: impl Into<String>, error_id: ErrorId, agent_id: AgentId) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            error_id,
            agent_id,
            classification: None,
            recovery_approach: None,
            success: false,
            metadata: HashMap::new(),
        }
    }

    /// Attach the classification.
    #[must_use]
    pub fn with_classification(mut self, classification: ErrorClassification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Record the recovery outcome.
    #[must_use]
    pub fn with_outcome(mut self, approach: RecoveryApproach, success: bool) -> Self {
        self.recovery_approach = Some(approach);
        self.success = success;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Filter for querying audit records from a sink.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Only records for this agent.
    pub agent_id: Option<AgentId>,

    /// Only records for this operation.
    pub operation: Option<String>,

    /// Only records at or after this time.
    pub since: Option<DateTime<Utc>>,

    /// Cap on returned records.
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn for_agent(agent_id: AgentId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if &record.agent_id != agent_id {
                return false;
            }
        }
        if let Some(operation) = &self.operation {
            if &record.operation != operation {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Persistence collaborator for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist a record.
    async fn write(&self, record: AuditRecord) -> WardenResult<()>;

    /// Fetch records matching a filter.
    async fn query(&self, filter: &AuditFilter) -> WardenResult<Vec<AuditRecord>>;
}

/// Sink that drops every record. Used when auditing is not wired up.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn write(&self, _record: AuditRecord) -> WardenResult<()> {
        Ok(())
    }

    async fn query(&self, _filter: &AuditFilter) -> WardenResult<Vec<AuditRecord>> {
        Ok(Vec::new())
    }
}

/// In-memory sink for tests and short-lived tooling.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the sink holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, record: AuditRecord) -> WardenResult<()> {
        self.lock().push(record);
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> WardenResult<Vec<AuditRecord>> {
        let records = self.lock();
        let mut matched: Vec<AuditRecord> = records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
