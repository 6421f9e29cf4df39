//! Angle helpers for undirected corner axes.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// Unsigned angular distance between `a` and `b`, in `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let d = (b - a).rem_euclid(TAU);
    d.min(TAU - d)
}

/// Whether two axes (angles modulo π) are perpendicular within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let gap = angle_diff_abs(reference_angle, other_angle);
    (gap - FRAC_PI_2).abs() <= tolerance.abs()
}

/// Deviation of a directed edge from an undirected axis, in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let d = (vec_angle - axis_angle).rem_euclid(PI);
    d.min(PI - d)
}

/// Estimate the board's first grid axis from corner orientations.
///
/// Neighbouring corners have bright diagonals 90° apart, so the diagonals
/// are averaged in quadruple-angle space (θ ≡ θ + π/2) weighted by
/// strength. The grid axes run 45° off the mean diagonal. Returns an angle
/// in `[0, π/2)`; the second axis is perpendicular to it.
pub fn estimate_board_axis(orientations: impl IntoIterator<Item = (f32, f32)>) -> Option<f32> {
    let mut sx = 0.0f32;
    let mut sy = 0.0f32;
    let mut weight_sum = 0.0f32;
    for (theta, strength) in orientations {
        let w = strength.max(0.0);
        if w <= 0.0 {
            continue;
        }
        sx += w * (4.0 * theta).cos();
        sy += w * (4.0 * theta).sin();
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        return None;
    }
    let (mx, my) = (sx / weight_sum, sy / weight_sum);
    if mx * mx + my * my < 1e-4 {
        // No dominant orientation.
        return None;
    }
    let diagonal = 0.25 * my.atan2(mx);
    Some((diagonal + FRAC_PI_4).rem_euclid(FRAC_PI_2))
}
