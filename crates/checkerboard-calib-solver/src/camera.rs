use nalgebra::{Isometry3, Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics without skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Read the intrinsics back from a camera matrix; skew is ignored.
    pub fn from_k_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    #[inline]
    pub fn to_pixel(&self, n: &Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    #[inline]
    pub fn to_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Brown-Conrady lens distortion with five coefficients.
///
/// Field order matches the persisted array: `k1, k2, p1, p2, k3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|c| *c == 0.0)
    }

    /// Apply the distortion to an undistorted normalized point.
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: &Vector2<f64>) -> Vector2<f64> {
        let mut n = *d;
        for _ in 0..20 {
            let err = self.distort(&n) - d;
            n -= err;
            if err.norm_squared() < 1e-24 {
                break;
            }
        }
        n
    }
}

/// Project a board point seen under `pose` (board -> camera) into pixels.
/// `None` when the point is not in front of the camera.
pub fn project_point(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    pose: &Isometry3<f64>,
    p: &Point3<f64>,
) -> Option<Point2<f64>> {
    let pc = pose * p;
    if pc.z <= f64::EPSILON {
        return None;
    }
    let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
    Some(intrinsics.to_pixel(&distortion.distort(&n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn k_matrix_round_trips() {
        let k = CameraIntrinsics {
            fx: 810.0,
            fy: 790.0,
            cx: 321.5,
            cy: 239.5,
        };
        assert_eq!(CameraIntrinsics::from_k_matrix(&k.k_matrix()), k);
        assert_eq!(k.k_matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            k1: -0.25,
            k2: 0.08,
            p1: 0.001,
            p2: -0.0015,
            k3: 0.0,
        };
        let n = Vector2::new(0.3, -0.2);
        let back = d.undistort(&d.distort(&n));
        assert_relative_eq!(back.x, n.x, epsilon = 1e-10);
        assert_relative_eq!(back.y, n.y, epsilon = 1e-10);
    }

    #[test]
    fn zero_distortion_is_identity() {
        let n = Vector2::new(0.7, 0.1);
        assert_eq!(Distortion::default().distort(&n), n);
        assert!(Distortion::default().is_zero());
    }

    #[test]
    fn points_behind_the_camera_do_not_project() {
        let k = CameraIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        };
        let pose = Isometry3::translation(0.0, 0.0, -1.0);
        assert!(project_point(&k, &Distortion::default(), &pose, &Point3::origin()).is_none());

        let pose = Isometry3::translation(0.0, 0.0, 2.0);
        let p = project_point(&k, &Distortion::default(), &pose, &Point3::new(0.2, 0.0, 0.0))
            .expect("in front");
        assert_relative_eq!(p.x, 370.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 240.0, epsilon = 1e-9);
    }
}
