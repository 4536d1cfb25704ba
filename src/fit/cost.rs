//! Per-voxel residual binder.
//!
//! `DecayCost` ties a model kind to one voxel's selected b-values and observed
//! intensities and exposes it to the Levenberg–Marquardt solver. There is no
//! analytic derivative: the Jacobian is a forward difference of the residuals.
//!
//! The cost also remembers the lowest-cost finite position it has evaluated so
//! the solver can fall back to it when a solve ends without converging.
//!
//! Every model evaluation is counted, finite-difference columns included. Once
//! an evaluation budget is spent, `residuals()` and `jacobian()` return `None`,
//! which ends the solve.

use std::cell::{Cell, RefCell};

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Owned};

use crate::domain::ModelKind;
use crate::math::forward_jacobian;
use crate::models::{predict, predict_into};

#[derive(Debug, Clone)]
struct BestPosition {
    sse: f64,
    params: Vec<f64>,
}

/// Residual vector `observed[i] - S(b[i]; params)` for one voxel.
#[derive(Debug)]
pub struct DecayCost<'a> {
    model: ModelKind,
    b_values: &'a [f64],
    observed: &'a [f64],
    params: DVector<f64>,
    epsilon: f64,
    best: RefCell<Option<BestPosition>>,
    evaluations: Cell<usize>,
    budget: usize,
    /// Residuals of the last `residuals()` call, reused as the Jacobian base.
    last: RefCell<Option<(DVector<f64>, Vec<f64>)>>,
}

impl<'a> DecayCost<'a> {
    /// # Panics
    /// Panics if `b_values` and `observed` differ in length or `initial` does not
    /// have `model.param_count()` entries.
    pub fn new(model: ModelKind, b_values: &'a [f64], observed: &'a [f64], initial: &[f64], epsilon: f64) -> Self {
        assert_eq!(b_values.len(), observed.len(), "one observation per selected b-value");
        assert_eq!(initial.len(), model.param_count(), "initial vector length");
        Self {
            model,
            b_values,
            observed,
            params: DVector::from_column_slice(initial),
            epsilon,
            best: RefCell::new(None),
            evaluations: Cell::new(0),
            budget: usize::MAX,
            last: RefCell::new(None),
        }
    }

    /// Cap the number of model evaluations (residual vectors) this cost will compute.
    pub fn with_evaluation_budget(mut self, max_evaluations: usize) -> Self {
        self.budget = max_evaluations;
        self
    }

    /// Model evaluations spent so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn selected_count(&self) -> usize {
        self.b_values.len()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Current parameter vector.
    pub fn position(&self) -> &[f64] {
        self.params.as_slice()
    }

    /// Lowest-cost finite position evaluated so far.
    pub fn best_position(&self) -> Option<Vec<f64>> {
        self.best.borrow().as_ref().map(|b| b.params.clone())
    }

    /// Residuals at `params`, written into `out`.
    pub fn residual_into(&self, params: &[f64], out: &mut [f64]) {
        for ((r, &b), &y) in out.iter_mut().zip(self.b_values).zip(self.observed) {
            *r = y - predict(self.model, b, params);
        }
    }

    pub fn residual(&self, params: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.selected_count()];
        self.residual_into(params, &mut out);
        out
    }

    /// Model prediction at the selected b-values.
    pub fn fitted_vector(&self, params: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.selected_count()];
        predict_into(self.model, self.b_values, params, &mut out);
        out
    }

    /// Root-mean-square residual at `params`.
    pub fn rms_error(&self, params: &[f64]) -> f64 {
        let r = self.residual(params);
        (r.iter().map(|v| v * v).sum::<f64>() / r.len() as f64).sqrt()
    }

    /// Charge `count` evaluations, or refuse when that would exceed the budget.
    fn spend(&self, count: usize) -> Option<()> {
        let used = self.evaluations.get().checked_add(count)?;
        if used > self.budget {
            return None;
        }
        self.evaluations.set(used);
        Some(())
    }

    fn remember(&self, residuals: &[f64]) {
        let sse: f64 = residuals.iter().map(|v| v * v).sum();
        let mut best = self.best.borrow_mut();
        let improved = best.as_ref().is_none_or(|b| sse < b.sse);
        if improved {
            *best = Some(BestPosition {
                sse,
                params: self.params.as_slice().to_vec(),
            });
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for DecayCost<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.spend(1)?;
        let r = self.residual(self.params.as_slice());
        *self.last.borrow_mut() = Some((self.params.clone(), r.clone()));
        if r.iter().any(|v| !v.is_finite()) {
            return None;
        }
        self.remember(&r);
        Some(DVector::from_vec(r))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let params = self.params.as_slice();
        let cached = match self.last.borrow().as_ref() {
            Some((at, r)) if *at == self.params => Some(r.clone()),
            _ => None,
        };
        let base = match cached {
            Some(r) => r,
            None => {
                self.spend(1)?;
                self.residual(params)
            }
        };
        self.spend(params.len())?;
        forward_jacobian(params, &base, self.epsilon, |p, out| self.residual_into(p, out))
    }
}
