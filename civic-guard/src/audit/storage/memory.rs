//! In-memory audit storage

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AuditQuery, SecurityAuditStorage};
use crate::audit::event::SecurityAuditEvent;
use crate::error::Result;
use crate::pagination::Pagination;

/// Append-only audit storage held in process memory
#[derive(Debug, Default)]
pub struct MemoryAuditStorage {
    events: RwLock<Vec<SecurityAuditEvent>>,
}

impl MemoryAuditStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event in append order
    pub async fn all(&self) -> Vec<SecurityAuditEvent> {
        self.events.read().await.clone()
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether nothing has been stored yet
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl SecurityAuditStorage for MemoryAuditStorage {
    async fn append(&self, event: &SecurityAuditEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn query(&self, query: &AuditQuery, page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
        let events = self.events.read().await;
        let mut matching: Vec<SecurityAuditEvent> = events
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        // stable: equal timestamps keep reverse append order
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(page.apply(matching))
    }
}
