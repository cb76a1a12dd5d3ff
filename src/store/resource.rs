//! The live state store resource: current state plus its persistence backend.
use bevy::prelude::*;

use crate::ledger::state::AppState;

use super::{
    kv::KeyValueStore,
    persistence::{self, StoreError},
};

/// Holds the one authoritative [`AppState`] and saves it on every commit.
#[derive(Resource)]
pub struct LedgerStore {
    state: AppState,
    backend: Box<dyn KeyValueStore>,
}

impl LedgerStore {
    /// Loads the persisted document, or starts empty when it is missing or corrupt.
    pub fn open(backend: Box<dyn KeyValueStore>) -> Self {
        let outcome = persistence::load_or_default(backend.as_ref());
        if let Some(err) = &outcome.warning {
            warn!(
                "Could not load saved state from {} ({}). Starting with an empty ledger.",
                backend.describe(),
                err
            );
        }
        if let Some(key) = &outcome.preserved_as {
            warn!("The unreadable document was kept as '{}'.", key);
        }
        for notice in &outcome.notices {
            warn!("Saved state: {}", notice);
        }

        info!(
            "Ledger store opened on {} with {} child profile(s)",
            backend.describe(),
            outcome.state.len()
        );

        Self {
            state: outcome.state,
            backend,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Persists `next`, then swaps it in. A failed write leaves the state untouched.
    pub fn commit(&mut self, next: AppState) -> Result<(), StoreError> {
        persistence::save(self.backend.as_ref(), &next)?;
        self.state = next;
        Ok(())
    }
}
