//! Core types and utilities shared by the checkerboard calibration crates.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! decode images or know about camera models; it only provides the corner
//! types produced by the detector, a borrowed grayscale view with bilinear
//! sampling, planar homography estimation and the logging setup.

mod corner;
mod homography;
mod image;
mod logger;

pub use corner::{Corner, GridCoords, LabeledCorner, TargetDetection};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, verbosity_level};
