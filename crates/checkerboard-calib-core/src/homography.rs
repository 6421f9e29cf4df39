use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

/// Planar projective transform `dst ~ H * src`, normalised so `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Map a point; `None` when it lands on the line at infinity.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * p.to_homogeneous();
        (v.z.abs() >= 1e-12).then(|| Point2::new(v.x / v.z, v.y / v.z))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Largest distance between `H * src[k]` and `dst[k]`.
    pub fn max_transfer_error(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<f64> {
        src.iter().zip(dst).try_fold(0.0_f64, |worst, (s, d)| {
            Some(worst.max((self.apply(*s)? - d).norm()))
        })
    }
}

/// Similarity that moves the centroid to the origin and scales the mean
/// distance from it to sqrt(2).
struct Conditioner {
    t: Matrix3<f64>,
}

impl Conditioner {
    fn fit(pts: &[Point2<f64>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.to_homogeneous()) / n;
        let (cx, cy) = (centroid.x, centroid.y);
        let spread = pts
            .iter()
            .map(|p| (p.x - cx).hypot(p.y - cy))
            .sum::<f64>()
            / n;
        let s = if spread > 1e-12 {
            std::f64::consts::SQRT_2 / spread
        } else {
            1.0
        };
        Self {
            t: Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0),
        }
    }

    #[inline]
    fn map(&self, p: &Point2<f64>) -> (f64, f64) {
        let v = self.t * p.to_homogeneous();
        (v.x, v.y)
    }
}

/// Estimate `H` with `dst ~ H * src` from at least four correspondences
/// using the conditioned direct linear transform.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "trace", skip_all, fields(n = src.len()))
)]
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let cs = Conditioner::fit(src);
    let cd = Conditioner::fit(dst);

    // Pad to at least 9 rows so the SVD always yields a full 9x9 V^T.
    let mut a = DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y) = cs.map(s);
        let (u, v) = cd.map(d);
        let r = 2 * k;
        a.row_mut(r)
            .copy_from_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.argmin().0;
    let h = v_t.row(smallest);
    let hn = Matrix3::from_iterator(h.iter().copied()).transpose();

    let h = cd.t.try_inverse()? * hn * cs.t;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 || h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn skewed() -> Homography {
        Homography::new(Matrix3::new(
            1.2, -0.1, 40.0, //
            0.07, 0.9, 25.0, //
            0.0006, 0.0011, 1.0,
        ))
    }

    fn grid(cols: usize, rows: usize) -> Vec<Point2<f64>> {
        (0..rows)
            .flat_map(|y| (0..cols).map(move |x| Point2::new(x as f64 * 10.0, y as f64 * 10.0)))
            .collect()
    }

    #[test]
    fn inverse_maps_points_back() {
        let h = skewed();
        let inv = h.inverse().expect("invertible");
        for p in [Point2::new(0.0, 0.0), Point2::new(-30.0, 75.0), Point2::new(210.0, 160.0)] {
            let back = inv.apply(h.apply(p).expect("finite")).expect("finite");
            assert_relative_eq!(back, p, epsilon = 1e-8);
        }
    }

    #[test]
    fn recovers_transform_from_four_points() {
        let src = grid(2, 2);
        let dst: Vec<_> = src.iter().map(|p| skewed().apply(*p).expect("finite")).collect();
        let est = estimate_homography(&src, &dst).expect("estimate");
        assert_relative_eq!(est.h, skewed().h, epsilon = 1e-8);
    }

    #[test]
    fn recovers_transform_from_a_grid() {
        let src = grid(6, 4);
        let dst: Vec<_> = src.iter().map(|p| skewed().apply(*p).expect("finite")).collect();
        let est = estimate_homography(&src, &dst).expect("estimate");
        assert!(est.max_transfer_error(&src, &dst).expect("finite") < 1e-6);
    }

    #[test]
    fn rejects_short_or_mismatched_input() {
        let four = grid(2, 2);
        assert!(estimate_homography(&four[..3], &four[..3]).is_none());
        assert!(estimate_homography(&four, &four[..3]).is_none());
    }
}
