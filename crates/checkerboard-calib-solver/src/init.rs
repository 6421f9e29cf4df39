//! Closed-form starting point for the refinement.

use crate::camera::CameraIntrinsics;
use crate::error::SolveError;
use nalgebra::{Isometry3, Matrix2, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector2, Vector3};

/// Focal lengths from board-to-image homographies with the principal point
/// fixed at the image centre.
///
/// With `H' = A⁻¹H` (A shifts the principal point to the origin) the first
/// two columns of `diag(1/fx, 1/fy, 1) H'` are orthogonal and of equal
/// length. Both constraints are linear in `(1/fx², 1/fy²)`, so a single
/// tilted view already determines the focal lengths.
pub fn init_intrinsics(
    homographies: &[Matrix3<f64>],
    image_size: (u32, u32),
) -> Result<CameraIntrinsics, SolveError> {
    let cx = (image_size.0 as f64 - 1.0) * 0.5;
    let cy = (image_size.1 as f64 - 1.0) * 0.5;
    let shift = Matrix3::new(
        1.0, 0.0, -cx, //
        0.0, 1.0, -cy, //
        0.0, 0.0, 1.0,
    );

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for h in homographies {
        let hp = shift * h;
        let hp = hp / hp.norm();
        let (a1, b1, c1) = (hp[(0, 0)], hp[(1, 0)], hp[(2, 0)]);
        let (a2, b2, c2) = (hp[(0, 1)], hp[(1, 1)], hp[(2, 1)]);

        let rows = [
            (Vector2::new(a1 * a2, b1 * b2), -c1 * c2),
            (Vector2::new(a1 * a1 - a2 * a2, b1 * b1 - b2 * b2), -(c1 * c1 - c2 * c2)),
        ];
        for (coef, rhs) in rows {
            let norm = (coef.norm_squared() + rhs * rhs).sqrt();
            if norm <= f64::EPSILON {
                continue;
            }
            let (coef, rhs) = (coef / norm, rhs / norm);
            ata += coef * coef.transpose();
            atb += coef * rhs;
        }
    }

    let inv_f2 = ata
        .try_inverse()
        .map(|inv| inv * atb)
        .ok_or(SolveError::DegenerateIntrinsics)?;
    // Both components are squared inverse focal lengths; anything else
    // means the views do not come from a pinhole camera.
    if !(inv_f2.x > 0.0 && inv_f2.y > 0.0) {
        return Err(SolveError::DegenerateIntrinsics);
    }
    let fx = inv_f2.x.recip().sqrt();
    let fy = inv_f2.y.recip().sqrt();
    if !fx.is_finite() || !fy.is_finite() {
        return Err(SolveError::DegenerateIntrinsics);
    }

    Ok(CameraIntrinsics { fx, fy, cx, cy })
}

/// Decompose a plane-induced homography into the board pose `T_C_B`
/// (board -> camera), keeping the board in front of the camera.
pub fn pose_from_homography(k: &Matrix3<f64>, h: &Matrix3<f64>) -> Option<Isometry3<f64>> {
    let k_inv = k.try_inverse()?;
    let k_inv_h1 = k_inv * h.column(0);
    let k_inv_h2 = k_inv * h.column(1);
    let k_inv_h3 = k_inv * h.column(2);

    let norm = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if norm <= f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if lambda * k_inv_h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1: Vector3<f64> = lambda * k_inv_h1;
    let r2: Vector3<f64> = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);
    let t: Vector3<f64> = lambda * k_inv_h3;

    let r = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let r_orth = u * v_t;

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Some(Isometry3::from_parts(Translation3::from(t), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn k_true() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 600.0,
            fy: 610.0,
            cx: 319.5,
            cy: 239.5,
        }
    }

    fn homography(k: &Matrix3<f64>, pose: &Isometry3<f64>) -> Matrix3<f64> {
        let r = pose.rotation.to_rotation_matrix();
        let r = r.matrix();
        let t = pose.translation.vector;
        k * Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t])
    }

    fn pose(roll: f64, pitch: f64, yaw: f64, t: Vector3<f64>) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(t),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    #[test]
    fn focal_lengths_from_tilted_views() {
        let k = k_true().k_matrix();
        let hs = [
            homography(&k, &pose(0.3, 0.1, 0.05, Vector3::new(-2.0, -1.0, 12.0))),
            homography(&k, &pose(-0.2, 0.35, -0.1, Vector3::new(-3.0, -2.0, 14.0))),
        ];
        let est = init_intrinsics(&hs, (640, 480)).expect("intrinsics");
        assert_relative_eq!(est.fx, 600.0, max_relative = 1e-6);
        assert_relative_eq!(est.fy, 610.0, max_relative = 1e-6);
    }

    #[test]
    fn fronto_parallel_view_is_degenerate() {
        let k = k_true().k_matrix();
        let hs = [homography(&k, &pose(0.0, 0.0, 0.4, Vector3::new(-1.0, -1.0, 10.0)))];
        assert_eq!(init_intrinsics(&hs, (640, 480)), Err(SolveError::DegenerateIntrinsics));
    }

    #[test]
    fn negative_squared_inverse_focal_is_degenerate() {
        // Exactly solved by 1/fx² = 1/fy² = -1 with the principal point at
        // the origin; no real camera produces it.
        let phi = (1.0 + 5f64.sqrt()) * 0.5;
        let h = Matrix3::new(
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, //
            1.0 / phi.sqrt(), phi.sqrt(), 1.0,
        );
        assert_eq!(init_intrinsics(&[h], (1, 1)), Err(SolveError::DegenerateIntrinsics));
    }

    #[test]
    fn pose_recovers_rotation_and_translation() {
        let k = k_true().k_matrix();
        let gt = pose(0.1, -0.05, 0.2, Vector3::new(0.1, -0.05, 1.0));
        // Any scale of H describes the same pose, including negative ones.
        let h = -3.0 * homography(&k, &gt);

        let est = pose_from_homography(&k, &h).expect("pose");
        assert_relative_eq!(est.translation.vector, gt.translation.vector, epsilon = 1e-9);
        assert!(est.rotation.angle_to(&gt.rotation) < 1e-9);
    }
}
