//! Versioned JSON array files for the calibration output.
//!
//! ```json
//! {
//!   "format": "checkerboard-calib/array",
//!   "version": 1,
//!   "dtype": "f64",
//!   "shape": [3, 3],
//!   "data": [fx, 0, cx, 0, fy, cy, 0, 0, 1]
//! }
//! ```
//!
//! Matrices are stored row-major. The distortion file has shape `[5]` in
//! the order `k1, k2, p1, p2, k3`.

use checkerboard_calib_solver::Distortion;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ARRAY_FORMAT: &str = "checkerboard-calib/array";
pub const ARRAY_VERSION: u32 = 1;
const DTYPE: &str = "f64";

/// File name of the camera matrix inside the output directory.
pub const MTX_FILE: &str = "mtx";
/// File name of the distortion coefficients inside the output directory.
pub const DIST_FILE: &str = "dist";

#[derive(Debug, Error)]
pub enum ArrayIoError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed array file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: unsupported array format {format:?} v{version} ({dtype})", path.display())]
    Unsupported {
        path: PathBuf,
        format: String,
        version: u32,
        dtype: String,
    },

    #[error("{}: expected shape {expected:?}, found {found:?}", path.display())]
    Shape {
        path: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("{}: shape needs {expected} values, found {found}", path.display())]
    Length {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ArrayFile {
    format: String,
    version: u32,
    dtype: String,
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Write `data` with the given shape.
pub fn write_array(path: &Path, shape: &[usize], data: &[f64]) -> Result<(), ArrayIoError> {
    let file = ArrayFile {
        format: ARRAY_FORMAT.to_string(),
        version: ARRAY_VERSION,
        dtype: DTYPE.to_string(),
        shape: shape.to_vec(),
        data: data.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|source| ArrayIoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ArrayIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an array and check it has exactly `expected_shape`.
pub fn read_array(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>, ArrayIoError> {
    let text = fs::read_to_string(path).map_err(|source| ArrayIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ArrayFile = serde_json::from_str(&text).map_err(|source| ArrayIoError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if file.format != ARRAY_FORMAT || file.version != ARRAY_VERSION || file.dtype != DTYPE {
        return Err(ArrayIoError::Unsupported {
            path: path.to_path_buf(),
            format: file.format,
            version: file.version,
            dtype: file.dtype,
        });
    }
    if file.shape != expected_shape {
        return Err(ArrayIoError::Shape {
            path: path.to_path_buf(),
            expected: expected_shape.to_vec(),
            found: file.shape,
        });
    }
    let expected: usize = file.shape.iter().product();
    if file.data.len() != expected {
        return Err(ArrayIoError::Length {
            path: path.to_path_buf(),
            expected,
            found: file.data.len(),
        });
    }
    Ok(file.data)
}

pub fn write_camera_matrix(path: &Path, k: &Matrix3<f64>) -> Result<(), ArrayIoError> {
    let data: Vec<f64> = (0..3).flat_map(|r| (0..3).map(move |c| k[(r, c)])).collect();
    write_array(path, &[3, 3], &data)
}

pub fn read_camera_matrix(path: &Path) -> Result<Matrix3<f64>, ArrayIoError> {
    let data = read_array(path, &[3, 3])?;
    Ok(Matrix3::from_row_slice(&data))
}

pub fn write_distortion(path: &Path, distortion: &Distortion) -> Result<(), ArrayIoError> {
    write_array(path, &[5], &distortion.to_array())
}

pub fn read_distortion(path: &Path) -> Result<Distortion, ArrayIoError> {
    let data = read_array(path, &[5])?;
    Ok(Distortion::from_array([data[0], data[1], data[2], data[3], data[4]]))
}

/// A camera matrix and distortion pair as stored on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraCalibration {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
}

/// Load the `mtx` and `dist` files written by [`crate::calibrate`].
pub fn load_calibration(
    mtx_path: impl AsRef<Path>,
    dist_path: impl AsRef<Path>,
) -> Result<CameraCalibration, ArrayIoError> {
    Ok(CameraCalibration {
        camera_matrix: read_camera_matrix(mtx_path.as_ref())?,
        distortion: read_distortion(dist_path.as_ref())?,
    })
}
