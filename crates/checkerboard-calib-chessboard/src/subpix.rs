//! Gradient-orthogonality sub-pixel refinement of X-junctions.
//!
//! Every image gradient inside a window around a true corner is orthogonal
//! to the vector from the corner to the gradient's location, so the corner
//! solves `sum(g gᵀ) q = sum(g gᵀ p)`. The window is re-centred on the new
//! estimate until it stops moving.

use crate::params::SubPixParams;
use checkerboard_calib_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine `initial`; returns `initial` unchanged when the window leaves the
/// image, the system is singular or the estimate drifts out of the window.
pub fn refine_corner(src: &GrayImageView<'_>, initial: Point2<f32>, params: &SubPixParams) -> Point2<f32> {
    let half = params.half_window.max(1) as i32;
    let margin = half as f32 + 2.0;
    let sigma2 = (half * half) as f32;

    let mut q = initial;
    for _ in 0..params.max_iters.max(1) {
        if !src.contains_with_margin(q.x, q.y, margin) {
            return initial;
        }

        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();
        for dy in -half..=half {
            for dx in -half..=half {
                let px = q.x + dx as f32;
                let py = q.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(src, px + 1.0, py) - sample_bilinear(src, px - 1.0, py));
                let gy = 0.5 * (sample_bilinear(src, px, py + 1.0) - sample_bilinear(src, px, py - 1.0));
                let w = (-((dx * dx + dy * dy) as f32) / sigma2).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b.x += gxx * px + gxy * py;
                b.y += gxy * px + gyy * py;
            }
        }

        let Some(inv) = a.try_inverse() else {
            return initial;
        };
        let next = inv * b;
        let next = Point2::new(next.x, next.y);
        if !next.x.is_finite() || !next.y.is_finite() {
            return initial;
        }

        let step = (next - q).norm();
        q = next;
        if step < params.epsilon {
            break;
        }
    }

    if (q - initial).norm() > half as f32 {
        return initial;
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::render_with;

    #[test]
    fn refines_an_offset_corner_to_subpixel_accuracy() {
        // Inner corner (0, 0) of a 3x3 board sits at (40.3, 39.6).
        let truth = Point2::new(40.3f32, 39.6f32);
        let square = 20.0;
        let img = render_with(100, 100, 3, 3, |x, y| ((x - truth.x) / square, (y - truth.y) / square));
        let view = img.view();

        let refined = refine_corner(&view, Point2::new(41.0, 39.0), &SubPixParams::default());
        assert!((refined - truth).norm() < 0.1, "refined {refined:?}");
    }

    #[test]
    fn keeps_initial_guess_near_the_border() {
        let img = render_with(30, 30, 3, 3, |x, y| (x / 10.0, y / 10.0));
        let view = img.view();
        let p = Point2::new(2.0, 2.0);
        assert_eq!(refine_corner(&view, p, &SubPixParams::default()), p);
    }
}
