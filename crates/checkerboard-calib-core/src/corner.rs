use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Raw X-junction candidate produced by the ChESS stage of the detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Corner {
    /// Corner position in pixel coordinates.
    pub position: Point2<f32>,

    /// Direction of the bright diagonal through the corner, in radians.
    ///
    /// Defined modulo π: the two bright squares of an X-junction sit on
    /// opposite sides of the corner, so the axis is undirected. Grid edges
    /// run at roughly ±45° to this direction.
    pub orientation: f32,

    /// ChESS response at the corner.
    pub strength: f32,
}

/// Integer grid coordinates (i, j) in board space.
///
/// `i` runs along the board columns (object x), `j` along the rows (object y).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

/// A corner that is part of a detected board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabeledCorner {
    /// Pixel position (sub-pixel refined once the detector finishes).
    pub position: Point2<f32>,

    /// Grid coordinates of this corner on the board.
    pub grid: GridCoords,

    /// ChESS response of the underlying raw corner.
    pub strength: f32,
}

/// One complete checkerboard found in an image.
///
/// `corners` are in row-major board order: `i` fastest, i.e. the same order
/// as the planar object points `(i, j, 0)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetDetection {
    pub cols: u32,
    pub rows: u32,
    pub corners: Vec<LabeledCorner>,
}

impl TargetDetection {
    /// Pixel positions in board order, widened to `f64` for the solver.
    pub fn image_points(&self) -> Vec<Point2<f64>> {
        self.corners
            .iter()
            .map(|c| Point2::new(c.position.x as f64, c.position.y as f64))
            .collect()
    }

    /// True when every inner corner of the `cols x rows` board is present.
    pub fn is_complete(&self) -> bool {
        self.corners.len() == (self.cols as usize) * (self.rows as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_points_keep_board_order() {
        let corners = (0..2)
            .flat_map(|j| {
                (0..3).map(move |i| LabeledCorner {
                    position: Point2::new(i as f32 * 10.0, j as f32 * 20.0),
                    grid: GridCoords { i, j },
                    strength: 1.0,
                })
            })
            .collect();
        let det = TargetDetection {
            cols: 3,
            rows: 2,
            corners,
        };

        assert!(det.is_complete());
        let pts = det.image_points();
        assert_eq!(pts[1], Point2::new(10.0, 0.0));
        assert_eq!(pts[3], Point2::new(0.0, 20.0));
    }
}
