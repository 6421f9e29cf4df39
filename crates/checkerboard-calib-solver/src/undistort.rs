use crate::camera::{CameraIntrinsics, Distortion};
use nalgebra::{Point2, Vector2};

/// Per-pixel lookup from an undistorted output image into the distorted
/// source image, for a camera that keeps its own matrix after undistortion.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    pub width: usize,
    pub height: usize,
    /// Source `(x, y)` per output pixel, row-major.
    pub map: Vec<[f32; 2]>,
}

impl UndistortMap {
    pub fn new(intrinsics: &CameraIntrinsics, distortion: &Distortion, width: usize, height: usize) -> Self {
        let mut map = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let p = distort_pixel(intrinsics, distortion, &Point2::new(x as f64, y as f64));
                map.push([p.x as f32, p.y as f32]);
            }
        }
        Self { width, height, map }
    }

    #[inline]
    pub fn source(&self, x: usize, y: usize) -> [f32; 2] {
        self.map[y * self.width + x]
    }
}

/// Where an ideal (undistorted) pixel is seen in the distorted image.
pub fn distort_pixel(intrinsics: &CameraIntrinsics, distortion: &Distortion, p: &Point2<f64>) -> Point2<f64> {
    let n = intrinsics.to_normalized(p);
    intrinsics.to_pixel(&distortion.distort(&n))
}

/// Remove lens distortion from observed pixel coordinates.
pub fn undistort_points(
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    points: &[Point2<f64>],
) -> Vec<Point2<f64>> {
    points
        .iter()
        .map(|p| {
            let n: Vector2<f64> = distortion.undistort(&intrinsics.to_normalized(p));
            intrinsics.to_pixel(&n)
        })
        .collect()
}
