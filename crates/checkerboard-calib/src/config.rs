use checkerboard_calib_chessboard::ChessboardParams;
use checkerboard_calib_solver::CalibrationOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Diagnostic output of a calibration run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DebugMode {
    #[default]
    Off,
    /// Write `<stem>_corners.png` overlays of every detected board into `dir`.
    Print { dir: PathBuf },
}

/// Everything [`crate::calibrate_with_config`] can be tuned with.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub detector: ChessboardParams,
    pub solver: CalibrationOptions,
    pub debug: DebugMode,
    /// Fewer detected views than this only produce a warning.
    pub min_recommended_views: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            detector: ChessboardParams::default(),
            solver: CalibrationOptions::default(),
            debug: DebugMode::Off,
            min_recommended_views: 10,
        }
    }
}

impl CalibrationConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
