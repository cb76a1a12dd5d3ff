//! Settings shared by every plugin.
pub mod config;
pub mod plugin;

pub use config::FairguardSettings;
pub use plugin::CorePlugin;
