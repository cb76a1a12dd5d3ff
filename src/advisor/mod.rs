//! Consequence advisor: provider abstraction, the pending suggestion stage, and telemetry.
pub mod broker;
pub mod errors;
pub mod events;
pub mod pending;
pub mod plugin;
pub mod systems;
pub mod telemetry;
pub mod types;

pub use plugin::AdvisorPlugin;
