//! Ledger plugin wiring the store, catalog, and command handling.
use bevy::prelude::*;

use crate::{
    core::FairguardSettings,
    store::{FileKeyValueStore, KeyValueStore, LedgerStore, MemoryKeyValueStore},
};

use super::{
    catalog::Catalog,
    events::{LedgerAppliedEvent, LedgerCommand, LedgerRejectedEvent},
    systems::apply_ledger_commands,
};

/// Where the ledger document lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LedgerStorage {
    /// `[storage] data_dir` from the settings.
    #[default]
    FromSettings,
    /// Nothing survives the process.
    InMemory,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerPlugin {
    storage: LedgerStorage,
}

impl LedgerPlugin {
    pub fn with_storage(storage: LedgerStorage) -> Self {
        Self { storage }
    }

    fn backend(&self, settings: &FairguardSettings) -> Box<dyn KeyValueStore> {
        match &self.storage {
            LedgerStorage::FromSettings => Box::new(FileKeyValueStore::new(&settings.data_dir)),
            LedgerStorage::InMemory => Box::new(MemoryKeyValueStore::new()),
        }
    }
}

impl Plugin for LedgerPlugin {
    fn build(&self, app: &mut App) {
        let settings = app
            .world()
            .get_resource::<FairguardSettings>()
            .cloned()
            .unwrap_or_default();

        app.insert_resource(Catalog::load_or_default(&settings.catalog_path))
            .insert_resource(LedgerStore::open(self.backend(&settings)))
            .add_message::<LedgerCommand>()
            .add_message::<LedgerAppliedEvent>()
            .add_message::<LedgerRejectedEvent>()
            .add_systems(Startup, log_catalog)
            .add_systems(Update, apply_ledger_commands);
    }
}

fn log_catalog(catalog: Res<Catalog>) {
    info!(
        "LedgerPlugin initialised with {} chores, {} rewards, {} avatars",
        catalog.chores().len(),
        catalog.rewards().len(),
        catalog.avatars().len()
    );
}
