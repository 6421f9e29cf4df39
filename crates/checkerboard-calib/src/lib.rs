//! Camera calibration from a directory of checkerboard images.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 9x6 inner corners; writes `out/mtx` and `out/dist`.
//! let calib = checkerboard_calib::calibrate("images", 9, 6, "out")?;
//! println!("K = {}", calib.camera_matrix);
//! println!("dist = {:?}", calib.distortion.to_array());
//!
//! let loaded = checkerboard_calib::load_calibration("out/mtx", "out/dist")?;
//! let img = image::open("images/img_000.png")?;
//! let fixed = checkerboard_calib::undistort_image(&img, &loaded.camera_matrix, &loaded.distortion);
//! fixed.save("undistorted.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `checkerboard_calib::core`: corner types, gray image views, homographies, logging.
//! - `checkerboard_calib::chessboard`: the inner-corner detector.
//! - `checkerboard_calib::solver`: camera model, planar calibration, undistortion maps.
//! - [`synthetic`]: rendered views with known ground truth.

pub use checkerboard_calib_chessboard as chessboard;
pub use checkerboard_calib_core as core;
pub use checkerboard_calib_solver as solver;

pub mod array_io;
mod calibrate;
mod config;
pub mod debug;
mod error;
pub mod synthetic;
mod undistort;

pub use array_io::{load_calibration, ArrayIoError, CameraCalibration};
pub use calibrate::{
    calibrate, calibrate_with_config, collect_views, list_images, Calibration, ViewCollection,
    IMAGE_EXTENSIONS,
};
pub use checkerboard_calib_solver::{CalibrationOptions, Distortion, SolveError};
pub use config::{CalibrationConfig, ConfigError, DebugMode};
pub use error::CalibrateError;
pub use undistort::undistort_image;
