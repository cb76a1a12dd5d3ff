//! CorePlugin loads the settings file and applies command-line overrides.
use std::path::PathBuf;

use bevy::prelude::*;

use super::config::{FairguardSettings, DEFAULT_CONFIG_PATH};

/// Registers [`FairguardSettings`] for every other plugin to read.
#[derive(Debug, Clone)]
pub struct CorePlugin {
    config_path: PathBuf,
    data_dir: Option<PathBuf>,
}

impl CorePlugin {
    pub fn with_config_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            data_dir: None,
        }
    }

    /// Overrides `[storage] data_dir` from the settings file.
    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub(crate) fn resolve_settings(&self) -> FairguardSettings {
        let mut settings = FairguardSettings::load_or_default(&self.config_path);
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = data_dir.clone();
        }
        settings
    }
}

impl Default for CorePlugin {
    fn default() -> Self {
        Self::with_config_path(DEFAULT_CONFIG_PATH)
    }
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.resolve_settings())
            .add_systems(Startup, log_startup_settings);
    }
}

fn log_startup_settings(settings: Res<FairguardSettings>) {
    info!(
        "CorePlugin initialised: data dir {:?}, catalog {:?}, chart window {}",
        settings.data_dir, settings.catalog_path, settings.chart_window
    );
}
