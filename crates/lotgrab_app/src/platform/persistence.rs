use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use engine_logging::{engine_error, engine_info, engine_warn};
use lotgrab_core::PlanOptions;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_PATH: &str = "./lotgrab.ron";
const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Settings remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub options: PlanOptions,
    pub log_destination: LogDestination,
    pub last_folder: Option<String>,
    /// RFC 3339 time of the last finished download run.
    pub last_run_utc: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            options: PlanOptions::default(),
            log_destination: LogDestination::default(),
            last_folder: None,
            last_run_utc: None,
        }
    }
}

/// Reads the settings file; a missing or unreadable file yields defaults.
pub(crate) fn load_config(path: &Path) -> AppConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppConfig::default();
        }
        Err(err) => {
            engine_warn!("Failed to read settings from {:?}: {}", path, err);
            return AppConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            engine_info!("Loaded settings from {:?}", path);
            config
        }
        Err(err) => {
            engine_warn!("Failed to parse settings from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}

/// Replaces the settings file. Failures are logged, never fatal.
pub(crate) fn save_config(path: &Path, config: &AppConfig) {
    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(config, pretty) {
        Ok(text) => text,
        Err(err) => {
            engine_error!("Failed to serialize settings: {}", err);
            return;
        }
    };

    if let Err(err) = write_replacing(path, &content) {
        engine_error!("Failed to write settings to {:?}: {}", path, err);
    }
}

fn write_replacing(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
