use crate::corners::default_chess_config;
use chess_corners::ChessConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 6.0,
            max_spacing_pix: 400.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Iterative gradient-based sub-pixel refinement applied to assembled boards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half size of the search window; the window is `2 * half_window + 1` wide.
    pub half_window: u32,
    pub max_iters: u32,
    /// Stop once the corner moves less than this many pixels in one iteration.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 1e-3,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// ChESS detector settings forwarded to `chess-corners`.
    pub chess: ChessConfig,
    pub graph: GridGraphParams,
    pub subpix: SubPixParams,

    /// Maximal homography residual of an assembled grid, relative to the
    /// median grid spacing. Grids above it are treated as mis-assembled.
    pub max_grid_residual_rel: f32,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            chess: default_chess_config(),
            graph: GridGraphParams::default(),
            subpix: SubPixParams::default(),
            max_grid_residual_rel: 0.3,
        }
    }
}
