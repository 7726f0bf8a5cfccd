//! Storage agent: facts → `memory` records.

use tracing::{debug, warn};

use super::MemoryPipeline;
use crate::store::StoreHandle;

impl MemoryPipeline {
    /// Write each fact as its own memory item, in order. A failed write is
    /// logged and does not stop later ones. Returns how many were written.
    pub async fn store(&self, store: &StoreHandle, facts: &[String]) -> usize {
        let mut stored = 0;
        for fact in facts {
            match store.save_memory(fact).await {
                Ok(item) => {
                    debug!(id = ?item.id, "memory stored");
                    stored += 1;
                }
                Err(e) => warn!(error = %e, "failed to store memory item"),
            }
        }
        stored
    }
}
