//! Advancing the equality-sense multipliers `yc, yd` once a trial point has been accepted.
//!
//! Two interchangeable policies, modeled as a tagged enum with explicit dispatch rather than a
//! trait object, per the driver's design notes.

use faer::prelude::Solve;
use faer::sparse::SparseColMatRef;
use faer::{Col, Mat, unzip, zip};

use crate::I;
use crate::E;
use crate::nlp::iterate::{Iterate, Step};

const KAPPA_SIGMA: E = 1e10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualsUpdateKind {
    /// Least-squares projection of the equality duals at the trial primal point.
    Lsq,
    /// Linearized Newton step: advance `yc, yd` along `dir` by `alpha_dual`.
    NewtonLinear,
}

impl Default for DualsUpdateKind {
    fn default() -> Self {
        DualsUpdateKind::Lsq
    }
}

impl std::str::FromStr for DualsUpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lsq" => Ok(DualsUpdateKind::Lsq),
            "linear" => Ok(DualsUpdateKind::NewtonLinear),
            other => Err(format!("unknown duals update type '{other}'")),
        }
    }
}

impl crate::OptionTrait for DualsUpdateKind {}

/// Which rule initializes `yc, yd` during the starting procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualsInit {
    /// Least-squares projection at the starting point, same formula as [`DualsUpdateKind::Lsq`].
    Lsq,
    /// `yc, yd <- 0`.
    Zero,
}

impl Default for DualsInit {
    fn default() -> Self {
        DualsInit::Lsq
    }
}

impl std::str::FromStr for DualsInit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lsq" => Ok(DualsInit::Lsq),
            "zero" => Ok(DualsInit::Zero),
            other => Err(format!("unknown duals initialization '{other}'")),
        }
    }
}

impl crate::OptionTrait for DualsInit {}

/// Builds the dense `m x n` matrix `[Jc; Jd]` from its sparse column-major blocks, where
/// `m = n_eq + n_ineq`.
fn stacked_jacobian_dense(
    jac_c: SparseColMatRef<I, E>,
    jac_d: SparseColMatRef<I, E>,
    n_eq: usize,
    n_ineq: usize,
    n_var: usize,
) -> Mat<E> {
    let mut j = Mat::<E>::zeros(n_eq + n_ineq, n_var);
    for (mat, row_offset) in [(jac_c, 0), (jac_d, n_eq)] {
        let col_ptr = mat.symbolic().col_ptr();
        let row_idx = mat.symbolic().row_idx();
        let vals = mat.val();
        for col in 0..mat.ncols() {
            for k in col_ptr[col]..col_ptr[col + 1] {
                j[(row_offset + row_idx[k], col)] = vals[k];
            }
        }
    }
    j
}

impl DualsUpdateKind {
    /// Advances `trial.yc, trial.yd` in place. `base` is the accepted iterate pre-step; `trial`
    /// already holds the accepted primal point and advanced bound multipliers.
    #[allow(clippy::too_many_arguments)]
    pub fn advance(
        &self,
        trial: &mut Iterate,
        base: &Iterate,
        dir: &Step,
        grad_f_trial: &Col<E>,
        jac_c_trial: SparseColMatRef<I, E>,
        jac_d_trial: SparseColMatRef<I, E>,
        n_eq: usize,
        n_ineq: usize,
        alpha_dual: E,
        mu: E,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
    ) {
        match self {
            DualsUpdateKind::NewtonLinear => {
                trial.yc = &base.yc + alpha_dual * &dir.dyc;
                trial.yd = &base.yd + alpha_dual * &dir.dyd;
            }
            DualsUpdateKind::Lsq => {
                let n_var = trial.x.nrows();
                let j = stacked_jacobian_dense(jac_c_trial, jac_d_trial, n_eq, n_ineq, n_var);
                let rhs_x = grad_f_trial - &trial.zl + &trial.zu;

                let jjt = &j * j.transpose();
                let m = n_eq + n_ineq;
                let mut reg = jjt;
                for i in 0..m {
                    reg[(i, i)] += 1e-10;
                }
                let jrhs = &j * &rhs_x;
                let y = reg.partial_piv_lu().solve(&jrhs);

                trial.yc = Col::from_fn(n_eq, |i| y[i]);
                trial.yd = Col::from_fn(n_ineq, |i| y[n_eq + i]);
            }
        }

        clamp_bound_duals(&mut trial.zl, &trial.x, x_l, mu);
        clamp_bound_duals(&mut trial.zu, &trial.x, x_u, mu);
        clamp_bound_duals(&mut trial.vl, &trial.s, d_l, mu);
        clamp_bound_duals(&mut trial.vu, &trial.s, d_u, mu);
    }
}

/// Clamps each component of `z` so that the primal-dual Hessian stays within `kappa_sigma` of
/// the primal log-barrier Hessian: `z in [mu / (kappa_sigma * slack), kappa_sigma * mu / slack]`.
fn clamp_bound_duals(z: &mut Col<E>, p: &Col<E>, bound: &Col<E>, mu: E) {
    zip!(z.as_mut(), p, bound).for_each(|unzip!(z, p, b)| {
        if b.is_finite() {
            let slack = (*p - *b).abs().max(1e-12);
            let lo = mu / (KAPPA_SIGMA * slack);
            let hi = KAPPA_SIGMA * mu / slack;
            *z = z.clamp(lo, hi);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::sparse::SparseColMat;

    #[test]
    fn newton_linear_advances_by_alpha_dual() {
        let base = Iterate::new(0, 1, 0);
        let mut trial = base.clone();
        let mut dir = Step::zeros(0, 1, 0);
        dir.dyc = Col::from_fn(1, |_| 2.0);
        let jac = SparseColMat::<I, E>::try_new_from_triplets(0, 0, &[]).unwrap();
        let grad_f = Col::zeros(0);
        let empty = Col::zeros(0);

        DualsUpdateKind::NewtonLinear.advance(
            &mut trial,
            &base,
            &dir,
            &grad_f,
            jac.as_ref(),
            jac.as_ref(),
            1,
            0,
            0.5,
            1e-2,
            &empty,
            &empty,
            &empty,
            &empty,
        );
        assert!((trial.yc[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clamp_keeps_dual_within_kappa_sigma_band() {
        let mut z = Col::from_fn(1, |_| 1e20);
        let p = Col::from_fn(1, |_| 1.0);
        let b = Col::from_fn(1, |_| 0.0);
        clamp_bound_duals(&mut z, &p, &b, 1e-3);
        assert!(z[0] <= KAPPA_SIGMA * 1e-3 / 1.0 + 1e-9);
    }
}
