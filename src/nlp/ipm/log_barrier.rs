//! The log-barrier objective `phi(x, s; mu)` and its directional derivative.

use faer::{Col, unzip, zip};

use crate::E;
use crate::nlp::iterate::{Iterate, Step};

fn barrier_term(p: &Col<E>, l: &Col<E>, u: &Col<E>) -> E {
    let mut sum = 0.0;
    zip!(p, l, u).for_each(|unzip!(p, l, u)| {
        if l.is_finite() {
            sum += (*p - *l).ln();
        }
        if u.is_finite() {
            sum += (*u - *p).ln();
        }
    });
    sum
}

fn barrier_grad(p: &Col<E>, l: &Col<E>, u: &Col<E>) -> Col<E> {
    Col::from_fn(p.nrows(), |i| {
        let mut g = 0.0;
        if l[i].is_finite() {
            g -= 1.0 / (p[i] - l[i]);
        }
        if u[i].is_finite() {
            g += 1.0 / (u[i] - p[i]);
        }
        g
    })
}

/// `phi(x, s; mu) = f(x) - mu * sum(log(x - x_l)) - mu * sum(log(x_u - x))`
/// `                      - mu * sum(log(s - d_l)) - mu * sum(log(d_u - s))`
/// with sums ranging only over finite bounds.
#[derive(Debug, Clone)]
pub struct LogBarrierProblem {
    phi: E,
    phi_trial: E,
    grad_phi_x: Col<E>,
    grad_phi_s: Col<E>,
}

impl LogBarrierProblem {
    pub fn new(n_var: usize, n_ineq: usize) -> Self {
        Self {
            phi: 0.0,
            phi_trial: 0.0,
            grad_phi_x: Col::zeros(n_var),
            grad_phi_s: Col::zeros(n_ineq),
        }
    }

    pub fn phi(&self) -> E {
        self.phi
    }

    pub fn phi_trial(&self) -> E {
        self.phi_trial
    }

    /// Caches `phi` and its gradient at `it`, given the already-evaluated objective `f` and
    /// gradient `grad_f`.
    pub fn update_with_nlp_info(
        &mut self,
        it: &Iterate,
        mu: E,
        f: E,
        grad_f: &Col<E>,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
    ) {
        self.phi = f - mu * barrier_term(&it.x, x_l, x_u) - mu * barrier_term(&it.s, d_l, d_u);
        self.grad_phi_x = grad_f + mu * barrier_grad(&it.x, x_l, x_u);
        self.grad_phi_s = mu * barrier_grad(&it.s, d_l, d_u);
    }

    /// Caches `phi` at a trial point, for line-search comparison only; does not touch the
    /// cached gradient, which still belongs to the current (non-trial) iterate.
    pub fn update_trial_func_only(
        &mut self,
        it_trial: &Iterate,
        mu: E,
        f_trial: E,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
    ) {
        self.phi_trial = f_trial
            - mu * barrier_term(&it_trial.x, x_l, x_u)
            - mu * barrier_term(&it_trial.s, d_l, d_u);
    }

    /// `grad(phi)^T dir`, using the gradient cached at the current (non-trial) iterate.
    pub fn directional_derivative(&self, dir: &Step) -> E {
        let mut g = 0.0;
        zip!(&self.grad_phi_x, &dir.dx).for_each(|unzip!(a, b)| g += a * b);
        zip!(&self.grad_phi_s, &dir.ds).for_each(|unzip!(a, b)| g += a * b);
        g
    }
}
