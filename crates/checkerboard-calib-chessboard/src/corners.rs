//! Raw X-junction candidates from the `chess-corners` ChESS detector.

use checkerboard_calib_core::{Corner, GrayImageView};
use chess_corners::{find_chess_corners_u8, ChessConfig, CornerDescriptor, ThresholdMode};
use log::warn;
use nalgebra::Point2;
use std::f32::consts::PI;

/// Default `chess-corners` settings for calibration boards: single scale,
/// responses below 20% of the strongest peak are dropped.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = 0.2;
    cfg.nms_radius = 2;
    cfg
}

/// Adapt a `chess-corners` descriptor into a [`Corner`].
///
/// The descriptor reports both local grid axes, with a dark sector between
/// `axes[0]` and `axes[1]` (counter-clockwise). The bright diagonal is
/// perpendicular to that sector's bisector.
pub fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    let dark = 0.5 * (c.axes[0].angle + c.axes[1].angle);
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: (dark + 0.5 * PI).rem_euclid(PI),
        strength: c.response,
    }
}

/// Detect ChESS corners in `src`. Detector failures are logged and yield no
/// corners.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(src, cfg), fields(width = src.width, height = src.height))
)]
pub fn detect_corners(src: &GrayImageView<'_>, cfg: &ChessConfig) -> Vec<Corner> {
    match find_chess_corners_u8(src.data, src.width as u32, src.height as u32, cfg) {
        Ok(raw) => raw.iter().map(adapt_chess_corner).collect(),
        Err(e) => {
            warn!("ChESS detection failed: {e}");
            Vec::new()
        }
    }
}
