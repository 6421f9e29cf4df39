//! Rendered checkerboard views with known ground truth.
//!
//! Used by the integration tests and handy for checking a setup without a
//! camera: render a few poses, calibrate, compare.

use checkerboard_calib_solver::{project_point, CameraIntrinsics, Distortion};
use image::{GrayImage, Luma};
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};

const DARK: f64 = 25.0;
const LIGHT: f64 = 230.0;
const BACKGROUND: f64 = 110.0;
const SUPERSAMPLE: u32 = 3;

/// A camera that produces synthetic images.
#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    pub width: u32,
    pub height: u32,
}

/// Board layout: `cols x rows` inner corners, squares of `square` units.
/// The board has one extra square on every side (so the outer ring of
/// squares is complete) and a white quiet zone of one more square.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticBoard {
    pub cols: u32,
    pub rows: u32,
    pub square: f64,
}

impl SyntheticBoard {
    /// Intensity at board-plane point `(x, y)` in board units.
    fn intensity(&self, x: f64, y: f64) -> f64 {
        let (u, v) = (x / self.square, y / self.square);
        let (cols, rows) = (self.cols as f64, self.rows as f64);
        if u < -2.0 || v < -2.0 || u >= cols + 1.0 || v >= rows + 1.0 {
            return BACKGROUND;
        }
        if u < -1.0 || v < -1.0 || u >= cols || v >= rows {
            return LIGHT;
        }
        if (u.floor() as i64 + v.floor() as i64).rem_euclid(2) == 0 {
            DARK
        } else {
            LIGHT
        }
    }

    /// Inner corners in board units, x fastest.
    pub fn corners(&self) -> Vec<Point3<f64>> {
        (0..self.rows)
            .flat_map(|j| {
                (0..self.cols).map(move |i| Point3::new(i as f64 * self.square, j as f64 * self.square, 0.0))
            })
            .collect()
    }

    /// Centre of the inner-corner grid.
    pub fn centre(&self) -> Point3<f64> {
        Point3::new(
            0.5 * (self.cols as f64 - 1.0) * self.square,
            0.5 * (self.rows as f64 - 1.0) * self.square,
            0.0,
        )
    }
}

/// Pose that puts the board centre at `centre_cam` (camera frame) after
/// rotating it by the given roll/pitch/yaw.
pub fn look_at_board(board: &SyntheticBoard, roll: f64, pitch: f64, yaw: f64, centre_cam: Vector3<f64>) -> Isometry3<f64> {
    let rot = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
    let t = centre_cam - rot * board.centre().coords;
    Isometry3::from_parts(Translation3::from(t), rot)
}

/// Render the board seen under `pose` (board -> camera).
pub fn render_view(camera: &SyntheticCamera, board: &SyntheticBoard, pose: &Isometry3<f64>) -> GrayImage {
    let inv = pose.inverse();
    // Board plane in camera coordinates: normal n through the pose origin.
    let n = pose.rotation * Vector3::z();
    let d = n.dot(&pose.translation.vector);

    let sample = |px: f64, py: f64| -> f64 {
        let ideal = camera
            .distortion
            .undistort(&camera.intrinsics.to_normalized(&Point2::new(px, py)));
        let ray = Vector3::new(ideal.x, ideal.y, 1.0);
        let denom = n.dot(&ray);
        if denom.abs() < 1e-12 {
            return BACKGROUND;
        }
        let s = d / denom;
        if s <= 0.0 {
            return BACKGROUND;
        }
        let on_board = inv * Point3::from(ray * s);
        board.intensity(on_board.x, on_board.y)
    };

    let ss = SUPERSAMPLE as f64;
    GrayImage::from_fn(camera.width, camera.height, |x, y| {
        let mut acc = 0.0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let px = x as f64 - 0.5 + (sx as f64 + 0.5) / ss;
                let py = y as f64 - 0.5 + (sy as f64 + 0.5) / ss;
                acc += sample(px, py);
            }
        }
        Luma([(acc / (ss * ss)).round().clamp(0.0, 255.0) as u8])
    })
}

/// Ground-truth pixel positions of the inner corners under `pose`.
pub fn project_corners(
    camera: &SyntheticCamera,
    board: &SyntheticBoard,
    pose: &Isometry3<f64>,
) -> Option<Vec<Point2<f64>>> {
    board
        .corners()
        .iter()
        .map(|p| project_point(&camera.intrinsics, &camera.distortion, pose, p))
        .collect()
}

/// A small set of tilted poses that constrain both focal lengths.
pub fn standard_poses(board: &SyntheticBoard, distance: f64) -> Vec<Isometry3<f64>> {
    [
        (0.35, 0.0, 0.0, 0.0, 0.0),
        (0.0, 0.4, 0.05, 0.4, -0.3),
        (-0.3, 0.25, -0.08, -0.5, 0.3),
        (0.25, -0.35, 0.1, 0.3, 0.2),
        (-0.2, -0.25, -0.12, -0.2, -0.4),
        (0.15, 0.3, 0.15, 0.2, 0.1),
    ]
    .into_iter()
    .map(|(roll, pitch, yaw, tx, ty)| {
        look_at_board(board, roll, pitch, yaw, Vector3::new(tx, ty, distance))
    })
    .collect()
}
