use crate::array_io::{write_camera_matrix, write_distortion, DIST_FILE, MTX_FILE};
use crate::config::{CalibrationConfig, DebugMode};
use crate::debug::{overlay_path, render_corner_overlay};
use crate::error::CalibrateError;
use checkerboard_calib_chessboard::ChessboardDetector;
use checkerboard_calib_core::{GrayImageView, TargetDetection};
use checkerboard_calib_solver::{calibrate_planar, CameraIntrinsics, Distortion, PlanarView};
use log::{debug, info, warn};
use nalgebra::Matrix3;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Extensions (lower case) of the files considered calibration images.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

/// Result of a calibration run.
#[derive(Clone, Debug)]
pub struct Calibration {
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
    /// (width, height) of the calibration images.
    pub image_size: (u32, u32),
    /// RMS reprojection error in pixels.
    pub rms_error: f64,
    /// Images that contributed a view, in processing order.
    pub used_images: Vec<PathBuf>,
    /// Images that were read but contributed nothing.
    pub skipped_images: Vec<PathBuf>,
}

impl Calibration {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_k_matrix(&self.camera_matrix)
    }
}

/// Views gathered from a set of images.
#[derive(Debug, Default)]
pub struct ViewCollection {
    pub views: Vec<PlanarView>,
    pub image_size: Option<(u32, u32)>,
    pub used: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Calibrate with default settings; see [`calibrate_with_config`].
pub fn calibrate(
    image_dir: impl AsRef<Path>,
    col_corners: u32,
    row_corners: u32,
    output_dir: impl AsRef<Path>,
) -> Result<Calibration, CalibrateError> {
    calibrate_with_config(
        image_dir,
        col_corners,
        row_corners,
        output_dir,
        &CalibrationConfig::default(),
    )
}

/// Detect a `col_corners x row_corners` checkerboard in every image of
/// `image_dir`, fit the camera and write `mtx` and `dist` into
/// `output_dir`.
///
/// Images are processed in file-name order. Images that fail to decode,
/// have a different size than the first usable image or show no complete
/// board are skipped. Nothing is written unless the fit succeeds.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(cols = col_corners, rows = row_corners))
)]
pub fn calibrate_with_config(
    image_dir: impl AsRef<Path>,
    col_corners: u32,
    row_corners: u32,
    output_dir: impl AsRef<Path>,
    config: &CalibrationConfig,
) -> Result<Calibration, CalibrateError> {
    if col_corners < 2 || row_corners < 2 {
        return Err(CalibrateError::InvalidBoard {
            cols: col_corners,
            rows: row_corners,
        });
    }

    let images = list_images(image_dir.as_ref())?;
    info!(
        "{} candidate image(s) in {}",
        images.len(),
        image_dir.as_ref().display()
    );

    let collected = collect_views(&images, col_corners, row_corners, config);
    let Some(image_size) = collected.image_size.filter(|_| !collected.views.is_empty()) else {
        return Err(CalibrateError::InsufficientData {
            examined: images.len(),
        });
    };
    if collected.views.len() < config.min_recommended_views {
        warn!(
            "board found in only {} image(s); at least {} are recommended",
            collected.views.len(),
            config.min_recommended_views
        );
    }

    let solution = calibrate_planar(&collected.views, image_size, &config.solver)?;
    let camera_matrix = solution.intrinsics.k_matrix();

    write_outputs(output_dir.as_ref(), &camera_matrix, &solution.distortion)?;

    Ok(Calibration {
        camera_matrix,
        distortion: solution.distortion,
        image_size,
        rms_error: solution.rms_error,
        used_images: collected.used,
        skipped_images: collected.skipped,
    })
}

/// Supported image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CalibrateError> {
    let entries = fs::read_dir(dir).map_err(|e| CalibrateError::file_access(dir, e))?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CalibrateError::file_access(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Detect the board in each image, in order. One image is held in memory
/// at a time.
pub fn collect_views(
    images: &[PathBuf],
    cols: u32,
    rows: u32,
    config: &CalibrationConfig,
) -> ViewCollection {
    let detector = ChessboardDetector::new(config.detector.clone());
    let object_points = PlanarView::board_points(cols, rows);
    let mut out = ViewCollection::default();

    for path in images {
        let gray = match image::open(path) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                out.skipped.push(path.clone());
                continue;
            }
        };

        let size = gray.dimensions();
        match out.image_size {
            Some(expected) if expected != size => {
                warn!(
                    "skipping {}: size {}x{} differs from {}x{}",
                    path.display(),
                    size.0,
                    size.1,
                    expected.0,
                    expected.1
                );
                out.skipped.push(path.clone());
                continue;
            }
            _ => {}
        }

        let Some(view) = GrayImageView::new(size.0 as usize, size.1 as usize, gray.as_raw()) else {
            out.skipped.push(path.clone());
            continue;
        };
        let Some(detection) = detector.detect(&view, cols, rows) else {
            debug!("no {cols}x{rows} board in {}", path.display());
            out.skipped.push(path.clone());
            continue;
        };

        debug!("board found in {}", path.display());
        out.image_size.get_or_insert(size);
        if let DebugMode::Print { dir } = &config.debug {
            write_overlay(dir, path, &gray, &detection);
        }
        out.views.push(PlanarView {
            object_points: object_points.clone(),
            image_points: detection.image_points(),
        });
        out.used.push(path.clone());
    }

    info!(
        "board found in {} of {} image(s)",
        out.views.len(),
        images.len()
    );
    out
}

fn write_overlay(dir: &Path, image_path: &Path, gray: &image::GrayImage, detection: &TargetDetection) {
    let target = overlay_path(dir, image_path);
    let result = fs::create_dir_all(dir)
        .map_err(image::ImageError::IoError)
        .and_then(|_| render_corner_overlay(gray, detection).save(&target));
    if let Err(e) = result {
        warn!("cannot write debug overlay {}: {e}", target.display());
    }
}

/// Hidden sibling of `name` in `dir` that a file is staged in before it is
/// renamed into place.
fn staging_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.partial"))
}

/// Write both files or neither. The new pair is staged next to the final
/// files and renamed over them, so a failed run leaves a previous pair
/// untouched.
fn write_outputs(dir: &Path, k: &Matrix3<f64>, distortion: &Distortion) -> Result<(), CalibrateError> {
    fs::create_dir_all(dir).map_err(|e| CalibrateError::file_access(dir, e))?;

    let staged_mtx = staging_path(dir, MTX_FILE);
    let staged_dist = staging_path(dir, DIST_FILE);
    let discard = || {
        let _ = fs::remove_file(&staged_mtx);
        let _ = fs::remove_file(&staged_dist);
    };

    let staged = write_camera_matrix(&staged_mtx, k).and_then(|_| write_distortion(&staged_dist, distortion));
    if let Err(e) = staged {
        discard();
        return Err(e.into());
    }

    for (from, name) in [(&staged_mtx, MTX_FILE), (&staged_dist, DIST_FILE)] {
        let to = dir.join(name);
        if let Err(e) = fs::rename(from, &to) {
            discard();
            return Err(CalibrateError::file_access(to, e));
        }
    }
    info!("wrote {} and {}", MTX_FILE, DIST_FILE);
    Ok(())
}
