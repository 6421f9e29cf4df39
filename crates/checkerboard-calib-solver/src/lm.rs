//! Non-linear least-squares problems and the Levenberg-Marquardt backend.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

/// Non-linear least squares problem with dense parameter/residual vectors.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of [`NllsProblem::residuals`]; central differences unless
    /// the problem knows better.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut j = DMatrix::zeros(self.num_residuals(), self.num_params());
        let mut xp = x.clone();
        for c in 0..x.len() {
            let h = numeric_step(x[c]);
            xp[c] = x[c] + h;
            let rp = self.residuals(&xp);
            xp[c] = x[c] - h;
            let rm = self.residuals(&xp);
            xp[c] = x[c];
            j.set_column(c, &((rp - rm) / (2.0 * h)));
        }
        j
    }
}

/// Central-difference step for a parameter of magnitude `x`.
#[inline]
pub fn numeric_step(x: f64) -> f64 {
    1e-6 * x.abs().max(1e-2)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Evaluation budget, in units of `num_params + 1` residual evaluations.
    pub max_iters: usize,
    /// Relative tolerance on the cost reduction.
    pub ftol: f64,
    /// Tolerance on the cosine between the residuals and any Jacobian column.
    pub gtol: f64,
    /// Relative tolerance on parameter updates.
    pub xtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            ftol: 1e-10,
            gtol: 1e-10,
            xtol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    /// Residual evaluations spent by the solver.
    pub iterations: usize,
    pub initial_cost: f64,
    /// Half the sum of squared residuals at the solution.
    pub final_cost: f64,
    pub converged: bool,
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Minimise `0.5 * |r(x)|²` starting at `x0` with the `levenberg-marquardt`
/// crate (MINPACK `lmder`).
pub fn levenberg_marquardt<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &SolveOptions,
) -> (DVector<f64>, SolveReport) {
    let initial_cost = 0.5 * problem.residuals(&x0).norm_squared();

    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.max_iters.max(1));
    let (wrapper, report) = lm.minimize(LmWrapper { problem, params: x0 });

    log::debug!(
        "LM: {} evaluations, cost {initial_cost:.3e} -> {:.3e}, {:?}",
        report.number_of_evaluations,
        report.objective_function,
        report.termination
    );

    (
        wrapper.params,
        SolveReport {
            iterations: report.number_of_evaluations,
            initial_cost,
            final_cost: report.objective_function,
            converged: report.termination.was_successful(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneDimProblem;

    impl NllsProblem for OneDimProblem {
        fn num_params(&self) -> usize {
            1
        }
        fn num_residuals(&self) -> usize {
            1
        }
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_element(1, x[0] - 3.0)
        }
        fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
            DMatrix::from_element(1, 1, 1.0)
        }
    }

    /// Fit `y = a * exp(b * t)` with the default numeric Jacobian.
    struct ExpFit {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl NllsProblem for ExpFit {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            self.t.len()
        }
        fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| x[0] * (x[1] * t).exp() - y),
            )
        }
    }

    #[test]
    fn solves_trivial_problem() {
        let (x, report) =
            levenberg_marquardt(&OneDimProblem, DVector::from_element(1, 10.0), &SolveOptions::default());
        assert!((x[0] - 3.0).abs() < 1e-6, "got {}", x[0]);
        assert!(report.final_cost < 1e-12);
        assert!(report.converged);
        assert!(report.iterations > 0);
    }

    #[test]
    fn fits_exponential_with_numeric_jacobian() {
        let t: Vec<f64> = (0..20).map(|k| k as f64 * 0.1).collect();
        let y = t.iter().map(|t| 2.5 * (-1.3 * t).exp()).collect();
        let problem = ExpFit { t, y };

        let (x, report) =
            levenberg_marquardt(&problem, DVector::from_vec(vec![1.0, 0.0]), &SolveOptions::default());
        assert!((x[0] - 2.5).abs() < 1e-6, "a = {}", x[0]);
        assert!((x[1] + 1.3).abs() < 1e-6, "b = {}", x[1]);
        assert!(report.final_cost < report.initial_cost);
    }
}
