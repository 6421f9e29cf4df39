use crate::corners::detect_corners;
use crate::geom::estimate_board_axis;
use crate::gridgraph::GridGraph;
use crate::params::ChessboardParams;
use crate::subpix::refine_corner;
use checkerboard_calib_core::{
    estimate_homography, Corner, GrayImageView, GridCoords, LabeledCorner, TargetDetection,
};
use log::debug;
use nalgebra::{Point2, Vector2};

/// Checkerboard inner-corner detector: ChESS peaks, a 4-connected grid
/// graph over them and gradient-based sub-pixel refinement.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Find all `cols x rows` inner corners of a checkerboard.
    ///
    /// Returns `None` unless every corner was found; partial boards are
    /// never reported.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, src), fields(width = src.width, height = src.height))
    )]
    pub fn detect(&self, src: &GrayImageView<'_>, cols: u32, rows: u32) -> Option<TargetDetection> {
        let raw = detect_corners(src, &self.params.chess);
        debug!("{} raw ChESS corners", raw.len());

        let mut detection = self.detect_from_corners(&raw, cols, rows)?;
        for c in &mut detection.corners {
            c.position = refine_corner(src, c.position, &self.params.subpix);
        }
        Some(detection)
    }

    /// Assemble a board from precomputed corners (no sub-pixel refinement).
    pub fn detect_from_corners(&self, corners: &[Corner], cols: u32, rows: u32) -> Option<TargetDetection> {
        let expected = cols as usize * rows as usize;
        if cols < 2 || rows < 2 || corners.len() < expected {
            debug!("{} corners cannot form a {cols}x{rows} board", corners.len());
            return None;
        }

        let Some(axis) = estimate_board_axis(corners.iter().map(|c| (c.orientation, c.strength))) else {
            debug!("no dominant corner orientation");
            return None;
        };

        let graph = GridGraph::new(corners, &self.params.graph, axis);
        let mut best: Option<(f32, Vec<Point2<f32>>, Vec<f32>)> = None;

        for component in graph.connected_components() {
            if component.len() != expected {
                continue;
            }
            let Some(coords) = graph.assign_grid_coordinates(&component) else {
                debug!("inconsistent grid coordinates in a component of {}", component.len());
                continue;
            };
            let Some((positions, strengths)) = place_on_board(corners, &coords, cols as usize, rows as usize)
            else {
                continue;
            };
            let total: f32 = strengths.iter().sum();
            if best.as_ref().is_none_or(|(s, _, _)| total > *s) {
                best = Some((total, positions, strengths));
            }
        }

        let Some((_, positions, strengths)) = best else {
            debug!("no connected grid component of {cols}x{rows} corners");
            return None;
        };

        let (positions, strengths) = canonical_order(positions, strengths, cols as usize, rows as usize);

        if !self.grid_is_consistent(&positions, cols as usize, rows as usize) {
            return None;
        }

        let corners = positions
            .into_iter()
            .zip(strengths)
            .enumerate()
            .map(|(k, (position, strength))| LabeledCorner {
                position,
                grid: GridCoords {
                    i: (k % cols as usize) as i32,
                    j: (k / cols as usize) as i32,
                },
                strength,
            })
            .collect();

        Some(TargetDetection { cols, rows, corners })
    }

    /// A planar grid maps to the image through a homography up to lens
    /// distortion; large residuals mean mis-linked corners.
    fn grid_is_consistent(&self, positions: &[Point2<f32>], cols: usize, rows: usize) -> bool {
        let src: Vec<Point2<f64>> = (0..positions.len())
            .map(|k| Point2::new((k % cols) as f64, (k / cols) as f64))
            .collect();
        let dst: Vec<Point2<f64>> = positions
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();

        let Some(h) = estimate_homography(&src, &dst) else {
            debug!("grid homography is degenerate");
            return false;
        };

        let mut spacings: Vec<f32> = Vec::with_capacity(rows * (cols - 1));
        for j in 0..rows {
            for i in 0..cols - 1 {
                spacings.push((positions[j * cols + i + 1] - positions[j * cols + i]).norm());
            }
        }
        spacings.sort_by(f32::total_cmp);
        let median = spacings[spacings.len() / 2] as f64;

        let Some(max_residual) = h.max_transfer_error(&src, &dst) else {
            return false;
        };

        let limit = self.params.max_grid_residual_rel as f64 * median;
        if max_residual > limit {
            debug!("grid residual {max_residual:.2}px exceeds {limit:.2}px");
            return false;
        }
        true
    }
}

/// Shift BFS coordinates to start at zero and fit them into `cols x rows`,
/// transposing when the board was assembled the other way round.
fn place_on_board(
    corners: &[Corner],
    coords: &[(usize, GridCoords)],
    cols: usize,
    rows: usize,
) -> Option<(Vec<Point2<f32>>, Vec<f32>)> {
    let min_i = coords.iter().map(|(_, g)| g.i).min()?;
    let max_i = coords.iter().map(|(_, g)| g.i).max()?;
    let min_j = coords.iter().map(|(_, g)| g.j).min()?;
    let max_j = coords.iter().map(|(_, g)| g.j).max()?;
    let width = (max_i - min_i + 1) as usize;
    let height = (max_j - min_j + 1) as usize;

    let transpose = if (width, height) == (cols, rows) {
        false
    } else if (width, height) == (rows, cols) {
        true
    } else {
        debug!("component spans {width}x{height}, expected {cols}x{rows}");
        return None;
    };

    let mut positions = vec![None; cols * rows];
    let mut strengths = vec![0.0; cols * rows];
    for &(idx, g) in coords {
        let (mut i, mut j) = ((g.i - min_i) as usize, (g.j - min_j) as usize);
        if transpose {
            std::mem::swap(&mut i, &mut j);
        }
        positions[j * cols + i] = Some(corners[idx].position);
        strengths[j * cols + i] = corners[idx].strength;
    }

    let positions = positions.into_iter().collect::<Option<Vec<_>>>()?;
    Some((positions, strengths))
}

/// Mean image-space step along +i and +j.
fn grid_directions(positions: &[Point2<f32>], cols: usize, rows: usize) -> (Vector2<f32>, Vector2<f32>) {
    let mut di = Vector2::zeros();
    let mut dj = Vector2::zeros();
    for j in 0..rows {
        for i in 0..cols {
            let p = positions[j * cols + i];
            if i + 1 < cols {
                di += positions[j * cols + i + 1] - p;
            }
            if j + 1 < rows {
                dj += positions[(j + 1) * cols + i] - p;
            }
        }
    }
    (di, dj)
}

/// True when the dominant component of `d` is positive (x wins ties).
fn points_forward(d: &Vector2<f32>) -> bool {
    if d.x.abs() >= d.y.abs() {
        d.x >= 0.0
    } else {
        d.y >= 0.0
    }
}

/// Pick the board symmetry that makes `i` and `j` run rightwards or
/// downwards in the image, so the first corner sits near the top-left. Square boards are also transposed so that `i` is
/// the more horizontal direction.
fn canonical_order(
    positions: Vec<Point2<f32>>,
    strengths: Vec<f32>,
    cols: usize,
    rows: usize,
) -> (Vec<Point2<f32>>, Vec<f32>) {
    let remap = |positions: &[Point2<f32>], strengths: &[f32], src: &dyn Fn(usize, usize) -> usize| {
        let mut p = Vec::with_capacity(positions.len());
        let mut s = Vec::with_capacity(strengths.len());
        for j in 0..rows {
            for i in 0..cols {
                let k = src(i, j);
                p.push(positions[k]);
                s.push(strengths[k]);
            }
        }
        (p, s)
    };

    let (mut positions, mut strengths) = (positions, strengths);
    if cols == rows {
        let (di, dj) = grid_directions(&positions, cols, rows);
        if di.x.abs() < dj.x.abs() {
            (positions, strengths) = remap(&positions, &strengths, &|i: usize, j: usize| i * cols + j);
        }
    }

    let (di, dj) = grid_directions(&positions, cols, rows);
    let flip_i = !points_forward(&di);
    let flip_j = !points_forward(&dj);
    if flip_i || flip_j {
        (positions, strengths) = remap(&positions, &strengths, &|i: usize, j: usize| {
            let si = if flip_i { cols - 1 - i } else { i };
            let sj = if flip_j { rows - 1 - j } else { j };
            sj * cols + si
        });
    }
    (positions, strengths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{render_checkerboard, render_with};
    use checkerboard_calib_core::GrayImage;

    fn detector() -> ChessboardDetector {
        let _ = env_logger::builder().is_test(true).try_init();
        ChessboardDetector::new(ChessboardParams::default())
    }

    #[test]
    fn detects_a_fronto_parallel_board_in_row_major_order() {
        let (img, expected) = render_checkerboard(7, 5, 25.0, (40.3, 38.7));
        let det = detector().detect(&img.view(), 7, 5).expect("board");

        assert!(det.is_complete());
        for (c, e) in det.corners.iter().zip(&expected) {
            assert!((c.position - e).norm() < 0.15, "{:?} vs {e:?}", c.position);
        }
        assert_eq!(det.corners[8].grid, GridCoords { i: 1, j: 1 });
    }

    #[test]
    fn accepts_the_transposed_pattern_size() {
        let (img, expected) = render_checkerboard(7, 5, 25.0, (40.0, 40.0));
        let det = detector().detect(&img.view(), 5, 7).expect("board");
        assert_eq!(det.corners.len(), expected.len());
        assert_eq!((det.cols, det.rows), (5, 7));
    }

    #[test]
    fn rejects_a_wrong_pattern_size() {
        let (img, _) = render_checkerboard(7, 5, 25.0, (40.0, 40.0));
        assert!(detector().detect(&img.view(), 6, 5).is_none());
        assert!(detector().detect(&img.view(), 8, 5).is_none());
    }

    #[test]
    fn blank_image_has_no_board() {
        let img = GrayImage {
            width: 120,
            height: 90,
            data: vec![128; 120 * 90],
        };
        assert!(detector().detect(&img.view(), 4, 3).is_none());
    }

    #[test]
    fn detects_a_rotated_board_starting_top_left() {
        let (cols, rows) = (6usize, 4usize);
        let rot = 25f32.to_radians();
        let (c, s) = (rot.cos(), rot.sin());
        let square = 24.0;
        let origin = (90.0f32, 60.0f32);
        // pixel -> board: inverse rotation around the first inner corner.
        let img = render_with(300, 260, cols, rows, |x, y| {
            let (dx, dy) = (x - origin.0, y - origin.1);
            ((c * dx + s * dy) / square, (-s * dx + c * dy) / square)
        });
        let truth = |i: usize, j: usize| {
            let (u, v) = (i as f32 * square, j as f32 * square);
            Point2::new(origin.0 + c * u - s * v, origin.1 + s * u + c * v)
        };

        let det = detector().detect(&img.view(), cols as u32, rows as u32).expect("board");
        assert!(det.is_complete());
        for lc in &det.corners {
            let e = truth(lc.grid.i as usize, lc.grid.j as usize);
            assert!((lc.position - e).norm() < 0.2, "{lc:?} vs {e:?}");
        }
    }
}
