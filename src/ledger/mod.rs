//! Point ledger: records, child profiles, pure transitions, and derived views.
pub mod catalog;
pub mod chart;
pub mod engine;
pub mod errors;
pub mod events;
pub mod plugin;
pub mod state;
pub mod systems;
pub mod types;

pub use plugin::{LedgerPlugin, LedgerStorage};
