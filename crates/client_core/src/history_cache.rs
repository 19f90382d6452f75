use shared::{domain::HistoryId, protocol::HistoryEntry};

use crate::{error::GatewayError, gateway::RephraseGateway};

/// Read-only mirror of the remote history list.
///
/// The store owns ordering and id assignment, so the cached sequence is only
/// ever replaced wholesale by [`HistoryCache::refresh`]; a failed refresh keeps
/// the last successfully fetched sequence.
#[derive(Debug, Default, Clone)]
pub struct HistoryCache {
    entries: Vec<HistoryEntry>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(&mut self, gateway: &dyn RephraseGateway) -> Result<usize, GatewayError> {
        self.entries = gateway.list_history().await?;
        Ok(self.entries.len())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: HistoryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
