use thiserror::Error;

/// Failures of the planar calibration solver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("need at least {required} view(s), got {got}")]
    NotEnoughViews { required: usize, got: usize },

    #[error("view {view}: {object} object points vs {image} image points (need at least 4 of each)")]
    MismatchedView {
        view: usize,
        object: usize,
        image: usize,
    },

    #[error("view {0}: board-to-image homography is degenerate")]
    DegenerateHomography(usize),

    #[error("focal lengths cannot be recovered from the views (fronto-parallel boards only?)")]
    DegenerateIntrinsics,

    #[error("optimisation produced non-finite parameters")]
    NonFinite,
}
