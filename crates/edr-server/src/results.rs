//! In-memory `command_id -> CommandResult` map, backed by
//! [`JsonCollection`]. IOC-related results are deliberately never stored
//! here (see `StreamBroker`'s classification in §4.5) to avoid unbounded
//! growth from the periodic IOC push cycle.

use edr_shared::{CommandResult, Result};

use crate::persistence::JsonCollection;

pub struct ResultTable {
    store: JsonCollection<CommandResult>,
}

impl ResultTable {
    #[must_use]
    pub const fn new(store: JsonCollection<CommandResult>) -> Self {
        Self { store }
    }

    pub async fn put(&self, result: CommandResult) {
        self.store.put(result.command_id.clone(), result).await;
    }

    pub async fn get(&self, command_id: &str) -> Option<CommandResult> {
        self.store.get(command_id).await
    }

    pub async fn contains(&self, command_id: &str) -> bool {
        self.store.contains(command_id).await
    }

    pub async fn force_save(&self) -> Result<()> {
        self.store.force_save().await
    }
}
