use crate::array_io::ArrayIoError;
use checkerboard_calib_solver::SolveError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::calibrate`].
#[derive(Debug, Error)]
pub enum CalibrateError {
    #[error("invalid board size {cols}x{rows}: need at least 2x2 inner corners")]
    InvalidBoard { cols: u32, rows: u32 },

    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable checkerboard views: board found in none of {examined} image(s)")]
    InsufficientData { examined: usize },

    #[error(transparent)]
    Solver(#[from] SolveError),

    #[error(transparent)]
    Persist(#[from] ArrayIoError),
}

impl CalibrateError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}
