//! Levenberg–Marquardt solve for one voxel.
//!
//! The solver configuration is fixed for the whole run (`SolverOptions::default()`
//! carries the production tolerances). A solve never fails: numerical trouble
//! ends the iteration early and the best position evaluated so far is returned,
//! flagged as not converged.

use levenberg_marquardt::LevenbergMarquardt;

use crate::fit::cost::DecayCost;

/// Tolerances shared by every voxel of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Relative reduction of the sum of squares.
    pub ftol: f64,
    /// Orthogonality between residuals and Jacobian columns.
    pub gtol: f64,
    /// Relative change of the parameter vector.
    pub xtol: f64,
    /// Function precision used to size finite-difference steps.
    pub epsilon: f64,
    /// Upper bound on model evaluations per voxel, finite-difference columns included.
    pub max_evaluations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-4,
            gtol: 1e-4,
            xtol: 1e-5,
            epsilon: 1e-9,
            max_evaluations: 200,
        }
    }
}

/// Outcome of one voxel solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub params: Vec<f64>,
    /// Root-mean-square residual at `params`.
    pub end_error: f64,
    /// Model evaluations spent, finite-difference columns included.
    pub evaluations: usize,
    pub converged: bool,
}

/// Minimise the sum of squared residuals of `cost` starting from its current position.
pub fn solve(cost: DecayCost<'_>, options: &SolverOptions) -> Solution {
    let n = cost.param_count();

    // Underdetermined systems are left at the initial position.
    if cost.selected_count() < n {
        let params = cost.position().to_vec();
        let end_error = cost.rms_error(&params);
        return Solution {
            params,
            end_error,
            evaluations: 0,
            converged: false,
        };
    }

    // The cost enforces the budget; the solver's own limit of
    // `patience * (n + 1)` residual calls is never the one that trips.
    let cost = cost.with_evaluation_budget(options.max_evaluations);
    let lm = LevenbergMarquardt::new()
        .with_ftol(options.ftol)
        .with_gtol(options.gtol)
        .with_xtol(options.xtol)
        .with_patience(options.max_evaluations.max(1));

    let (cost, report) = lm.minimize(cost);
    let converged = report.termination.was_successful();

    let params = if converged {
        cost.position().to_vec()
    } else {
        log::debug!(
            "{} solve stopped after {} evaluations: {:?}",
            cost.model(),
            cost.evaluations(),
            report.termination
        );
        cost.best_position().unwrap_or_else(|| cost.position().to_vec())
    };
    let end_error = cost.rms_error(&params);

    Solution {
        params,
        end_error,
        evaluations: cost.evaluations(),
        converged,
    }
}
