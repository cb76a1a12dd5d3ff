use std::{
    fs,
    path::{Path, PathBuf},
};

use bevy::prelude::*;
use serde::Deserialize;

use crate::{
    advisor::telemetry::{DEFAULT_ADVISOR_TELEMETRY_CAPACITY, DEFAULT_ADVISOR_TELEMETRY_LOG_PATH},
    ledger::{catalog::DEFAULT_CATALOG_PATH, chart::DEFAULT_CHART_WINDOW},
};

pub const DEFAULT_CONFIG_PATH: &str = "config/fairguard.toml";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Deserialize, Default)]
struct RawSettings {
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    catalog: RawCatalogSource,
    #[serde(default)]
    chart: RawChart,
    #[serde(default)]
    telemetry: RawTelemetry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawStorage {
    data_dir: String,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawCatalogSource {
    path: String,
}

impl Default for RawCatalogSource {
    fn default() -> Self {
        Self {
            path: DEFAULT_CATALOG_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawChart {
    window: usize,
}

impl Default for RawChart {
    fn default() -> Self {
        Self {
            window: DEFAULT_CHART_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawTelemetry {
    log_path: String,
    capacity: usize,
}

impl Default for RawTelemetry {
    fn default() -> Self {
        Self {
            log_path: DEFAULT_ADVISOR_TELEMETRY_LOG_PATH.to_string(),
            capacity: DEFAULT_ADVISOR_TELEMETRY_CAPACITY,
        }
    }
}

/// Runtime settings derived from `config/fairguard.toml`.
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct FairguardSettings {
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub chart_window: usize,
    pub telemetry_log_path: PathBuf,
    pub telemetry_capacity: usize,
}

impl FairguardSettings {
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|err| {
                warn!(
                    "Failed to parse {} ({}). Falling back to defaults.",
                    path.display(),
                    err
                );
                Self::default()
            }),
            Err(err) => {
                debug!(
                    "No settings at {} ({}). Using defaults.",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<RawSettings>(raw).map(Self::from)
    }
}

impl Default for FairguardSettings {
    fn default() -> Self {
        RawSettings::default().into()
    }
}

impl From<RawSettings> for FairguardSettings {
    fn from(value: RawSettings) -> Self {
        let non_blank = |value: String, fallback: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                PathBuf::from(fallback)
            } else {
                PathBuf::from(trimmed)
            }
        };

        Self {
            data_dir: non_blank(value.storage.data_dir, DEFAULT_DATA_DIR),
            catalog_path: non_blank(value.catalog.path, DEFAULT_CATALOG_PATH),
            chart_window: value.chart.window.max(1),
            telemetry_log_path: non_blank(
                value.telemetry.log_path,
                DEFAULT_ADVISOR_TELEMETRY_LOG_PATH,
            ),
            telemetry_capacity: value.telemetry.capacity.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = FairguardSettings::parse("").unwrap();
        assert_eq!(settings, FairguardSettings::default());
        assert_eq!(settings.chart_window, DEFAULT_CHART_WINDOW);
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn values_are_sanitised() {
        let settings = FairguardSettings::parse(
            r#"
            [storage]
            data_dir = "  "

            [chart]
            window = 0

            [telemetry]
            log_path = "/tmp/advisor.jsonl"
            capacity = 0
            "#,
        )
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(settings.chart_window, 1);
        assert_eq!(settings.telemetry_capacity, 1);
        assert_eq!(
            settings.telemetry_log_path,
            PathBuf::from("/tmp/advisor.jsonl")
        );
    }

    #[test]
    fn unreadable_or_invalid_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FairguardSettings::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(missing, FairguardSettings::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[chart\nwindow = ").unwrap();
        assert_eq!(
            FairguardSettings::load_or_default(&broken),
            FairguardSettings::default()
        );

        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "[chart]\nwindow = 5\n").unwrap();
        assert_eq!(FairguardSettings::load_or_default(&custom).chart_window, 5);
    }
}
