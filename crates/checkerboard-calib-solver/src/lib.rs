//! Planar camera calibration.
//!
//! A pinhole camera with five-coefficient Brown-Conrady distortion is fit
//! to several views of a planar target:
//! 1. a DLT homography per view,
//! 2. focal lengths from the homographies with the principal point at the
//!    image centre, and a pose per view from `K⁻¹H`,
//! 3. Levenberg-Marquardt over all intrinsics, distortion and poses.

mod camera;
mod error;
mod init;
mod lm;
mod planar;
mod undistort;

pub use camera::{project_point, CameraIntrinsics, Distortion};
pub use error::SolveError;
pub use init::{init_intrinsics, pose_from_homography};
pub use lm::{levenberg_marquardt, NllsProblem, SolveOptions, SolveReport};
pub use planar::{calibrate_planar, CalibrationOptions, PlanarCalibration, PlanarView};
pub use undistort::{distort_pixel, undistort_points, UndistortMap};
