//! Intrinsic calibration from several views of a planar target.

use crate::camera::{project_point, CameraIntrinsics, Distortion};
use crate::error::SolveError;
use crate::init::{init_intrinsics, pose_from_homography};
use crate::lm::{levenberg_marquardt, numeric_step, NllsProblem, SolveOptions, SolveReport};
use checkerboard_calib_core::estimate_homography;
use log::{debug, info};
use nalgebra::{
    DMatrix, DVector, Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

/// Matching object/image points of one view of the board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanarView {
    /// Board points on the plane `z = 0`.
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl PlanarView {
    /// Unit-spaced `cols x rows` board grid, x fastest.
    pub fn board_points(cols: u32, rows: u32) -> Vec<Point3<f64>> {
        (0..rows)
            .flat_map(|j| (0..cols).map(move |i| Point3::new(i as f64, j as f64, 0.0)))
            .collect()
    }
}

/// Which parameters the refinement may change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Keep the principal point at the image centre.
    pub fix_principal_point: bool,
    /// Force `p1 = p2 = 0`.
    pub zero_tangent_dist: bool,
    /// Keep `k3 = 0`.
    pub fix_k3: bool,
    pub solve: SolveOptions,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanarCalibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: Distortion,
    /// Board -> camera pose per view, in input order.
    pub poses: Vec<Isometry3<f64>>,
    /// Root mean square reprojection error over all points, in pixels.
    pub rms_error: f64,
    pub per_view_rms: Vec<f64>,
    pub report: SolveReport,
}

const N_INTRINSICS: usize = 9;
const N_POSE: usize = 6;
// Residual assigned to a point that ends up behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

/// Full parameter vector: `fx fy cx cy k1 k2 p1 p2 k3` followed by
/// `rx ry rz tx ty tz` (Rodrigues + translation) per view.
struct PlanarIntrinsicsProblem<'a> {
    views: &'a [PlanarView],
    full: DVector<f64>,
    /// Indices into the full vector that are optimised.
    free: Vec<usize>,
    /// Where each view's residuals start.
    offsets: Vec<usize>,
    n_residuals: usize,
}

impl<'a> PlanarIntrinsicsProblem<'a> {
    fn new(views: &'a [PlanarView], full: DVector<f64>, opts: &CalibrationOptions) -> Self {
        let mut free = Vec::with_capacity(full.len());
        for idx in 0..full.len() {
            let fixed = match idx {
                2 | 3 => opts.fix_principal_point,
                6 | 7 => opts.zero_tangent_dist,
                8 => opts.fix_k3,
                _ => false,
            };
            if !fixed {
                free.push(idx);
            }
        }

        let mut offsets = Vec::with_capacity(views.len());
        let mut n_residuals = 0;
        for v in views {
            offsets.push(n_residuals);
            n_residuals += 2 * v.object_points.len();
        }

        Self {
            views,
            full,
            free,
            offsets,
            n_residuals,
        }
    }

    fn reduced(&self) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&i| self.full[i]))
    }

    fn expand(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut full = self.full.clone();
        for (k, &i) in self.free.iter().enumerate() {
            full[i] = x[k];
        }
        full
    }

    fn view_residuals(&self, full: &DVector<f64>, view: usize, out: &mut [f64]) {
        let (intrinsics, distortion) = unpack_camera(full);
        let pose = unpack_pose(full, view);
        let v = &self.views[view];
        for (k, (obj, img)) in v.object_points.iter().zip(&v.image_points).enumerate() {
            match project_point(&intrinsics, &distortion, &pose, obj) {
                Some(p) => {
                    out[2 * k] = p.x - img.x;
                    out[2 * k + 1] = p.y - img.y;
                }
                None => {
                    out[2 * k] = BEHIND_CAMERA_RESIDUAL;
                    out[2 * k + 1] = BEHIND_CAMERA_RESIDUAL;
                }
            }
        }
    }
}

impl NllsProblem for PlanarIntrinsicsProblem<'_> {
    fn num_params(&self) -> usize {
        self.free.len()
    }

    fn num_residuals(&self) -> usize {
        self.n_residuals
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self.residuals_full(&self.expand(x))
    }

    /// A pose parameter only moves its own view's residuals, so those
    /// columns are differenced view by view.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut j = DMatrix::zeros(self.n_residuals, self.free.len());
        let mut full = self.expand(x);

        for (col, &idx) in self.free.iter().enumerate() {
            let h = numeric_step(full[idx]);
            let orig = full[idx];

            if idx < N_INTRINSICS {
                full[idx] = orig + h;
                let rp = self.residuals_full(&full);
                full[idx] = orig - h;
                let rm = self.residuals_full(&full);
                full[idx] = orig;
                j.set_column(col, &((rp - rm) / (2.0 * h)));
            } else {
                let view = (idx - N_INTRINSICS) / N_POSE;
                let start = self.offsets[view];
                let len = 2 * self.views[view].object_points.len();
                let mut rp = vec![0.0; len];
                let mut rm = vec![0.0; len];
                full[idx] = orig + h;
                self.view_residuals(&full, view, &mut rp);
                full[idx] = orig - h;
                self.view_residuals(&full, view, &mut rm);
                full[idx] = orig;
                for k in 0..len {
                    j[(start + k, col)] = (rp[k] - rm[k]) / (2.0 * h);
                }
            }
        }
        j
    }
}

impl PlanarIntrinsicsProblem<'_> {
    fn residuals_full(&self, full: &DVector<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.n_residuals);
        for view in 0..self.views.len() {
            let start = self.offsets[view];
            let len = 2 * self.views[view].object_points.len();
            self.view_residuals(full, view, &mut r.as_mut_slice()[start..start + len]);
        }
        r
    }
}

fn unpack_camera(full: &DVector<f64>) -> (CameraIntrinsics, Distortion) {
    (
        CameraIntrinsics {
            fx: full[0],
            fy: full[1],
            cx: full[2],
            cy: full[3],
        },
        Distortion::from_array([full[4], full[5], full[6], full[7], full[8]]),
    )
}

fn unpack_pose(full: &DVector<f64>, view: usize) -> Isometry3<f64> {
    let o = N_INTRINSICS + N_POSE * view;
    let rvec = Vector3::new(full[o], full[o + 1], full[o + 2]);
    let t = Vector3::new(full[o + 3], full[o + 4], full[o + 5]);
    Isometry3::from_parts(Translation3::from(t), UnitQuaternion::from_scaled_axis(rvec))
}

fn pack(intrinsics: &CameraIntrinsics, distortion: &Distortion, poses: &[Isometry3<f64>]) -> DVector<f64> {
    let mut full = DVector::zeros(N_INTRINSICS + N_POSE * poses.len());
    full[0] = intrinsics.fx;
    full[1] = intrinsics.fy;
    full[2] = intrinsics.cx;
    full[3] = intrinsics.cy;
    for (k, c) in distortion.to_array().into_iter().enumerate() {
        full[4 + k] = c;
    }
    for (view, pose) in poses.iter().enumerate() {
        let o = N_INTRINSICS + N_POSE * view;
        let r = pose.rotation.scaled_axis();
        let t = pose.translation.vector;
        for k in 0..3 {
            full[o + k] = r[k];
            full[o + 3 + k] = t[k];
        }
    }
    full
}

fn validate(views: &[PlanarView]) -> Result<(), SolveError> {
    if views.is_empty() {
        return Err(SolveError::NotEnoughViews {
            required: 1,
            got: 0,
        });
    }
    for (view, v) in views.iter().enumerate() {
        let (object, image) = (v.object_points.len(), v.image_points.len());
        if object != image || object < 4 {
            return Err(SolveError::MismatchedView {
                view,
                object,
                image,
            });
        }
    }
    Ok(())
}

/// Per-view RMS and the global RMS reprojection error.
fn reprojection_errors(
    views: &[PlanarView],
    intrinsics: &CameraIntrinsics,
    distortion: &Distortion,
    poses: &[Isometry3<f64>],
) -> (f64, Vec<f64>) {
    let mut total_sq = 0.0;
    let mut total_n = 0usize;
    let per_view = views
        .iter()
        .zip(poses)
        .map(|(v, pose)| {
            let sq: f64 = v
                .object_points
                .iter()
                .zip(&v.image_points)
                .map(|(obj, img)| match project_point(intrinsics, distortion, pose, obj) {
                    Some(p) => (p - img).norm_squared(),
                    None => BEHIND_CAMERA_RESIDUAL * BEHIND_CAMERA_RESIDUAL,
                })
                .sum();
            total_sq += sq;
            total_n += v.object_points.len();
            (sq / v.object_points.len() as f64).sqrt()
        })
        .collect();
    ((total_sq / total_n.max(1) as f64).sqrt(), per_view)
}

/// Calibrate a pinhole camera with Brown-Conrady distortion from planar
/// views, all taken with the same camera at `image_size` (width, height).
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(views, opts), fields(num_views = views.len()))
)]
pub fn calibrate_planar(
    views: &[PlanarView],
    image_size: (u32, u32),
    opts: &CalibrationOptions,
) -> Result<PlanarCalibration, SolveError> {
    validate(views)?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            let board: Vec<Point2<f64>> = v.object_points.iter().map(|p| Point2::new(p.x, p.y)).collect();
            estimate_homography(&board, &v.image_points)
                .map(|h| h.h)
                .ok_or(SolveError::DegenerateHomography(idx))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let intrinsics0 = init_intrinsics(&homographies, image_size)?;
    debug!(
        "initial intrinsics: fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        intrinsics0.fx, intrinsics0.fy, intrinsics0.cx, intrinsics0.cy
    );

    let k0 = intrinsics0.k_matrix();
    let poses0 = homographies
        .iter()
        .enumerate()
        .map(|(idx, h)| pose_from_homography(&k0, h).ok_or(SolveError::DegenerateHomography(idx)))
        .collect::<Result<Vec<_>, _>>()?;

    let problem = PlanarIntrinsicsProblem::new(views, pack(&intrinsics0, &Distortion::default(), &poses0), opts);
    let (x, report) = levenberg_marquardt(&problem, problem.reduced(), &opts.solve);
    let full = problem.expand(&x);
    if full.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::NonFinite);
    }

    let (intrinsics, distortion) = unpack_camera(&full);
    let poses: Vec<Isometry3<f64>> = (0..views.len()).map(|v| unpack_pose(&full, v)).collect();
    let (rms_error, per_view_rms) = reprojection_errors(views, &intrinsics, &distortion, &poses);

    info!(
        "calibrated from {} view(s): fx={:.3} fy={:.3} cx={:.3} cy={:.3}, RMS {:.4}px",
        views.len(),
        intrinsics.fx,
        intrinsics.fy,
        intrinsics.cx,
        intrinsics.cy,
        rms_error
    );

    Ok(PlanarCalibration {
        intrinsics,
        distortion,
        poses,
        rms_error,
        per_view_rms,
        report,
    })
}
