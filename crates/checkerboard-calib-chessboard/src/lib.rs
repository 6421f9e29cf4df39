//! Checkerboard inner-corner detector built on top of `checkerboard-calib-core`.
//!
//! Pipeline:
//! 1. ChESS corners from `chess-corners`, with each corner's bright
//!    diagonal derived from its two fitted grid axes.
//! 2. Corners that are too weak or too close together are dropped by the
//!    detector's relative threshold and non-maximum suppression.
//! 3. Board axes from the orientations (mod π/2).
//! 4. For each corner, up to 4 neighbours (right/left/up/down) based on
//!    distance, orthogonal orientations and edge direction; only mutual
//!    edges survive.
//! 5. BFS each connected component and assign integer coordinates (i, j).
//! 6. Keep a component that fills exactly `cols x rows` (up to swap) and
//!    is consistent with a planar homography.
//! 7. Canonical row-major ordering and iterative sub-pixel refinement over
//!    a wider window than the ChESS ring.

mod corners;
mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

#[cfg(test)]
mod test_support;

pub use corners::{adapt_chess_corner, default_chess_config, detect_corners};
pub use detector::ChessboardDetector;
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{ChessboardParams, GridGraphParams, SubPixParams};
pub use subpix::refine_corner;
