//! KKT residual bookkeeping, in both the NLP sense (`mu = 0`) and the barrier sense (`mu > 0`),
//! plus the two interchangeable error-scaling conventions of section 4.6.

use faer::sparse::SparseColMatRef;
use faer::{Col, unzip, zip};

use crate::I;
use crate::E;
use crate::linalg::vector_ops::sparse_transpose_mul;
use crate::nlp::iterate::{Iterate, inf_norm, one_norm};

/// Which convention is used to turn the raw (optim, feas, complem) sub-norms into a single
/// scaled scalar error. Modeled as a tagged enum with explicit dispatch, not a trait object, per
/// the driver's design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScaling {
    /// The convention from Wächter & Biegler section 3.8, using infinity norms of the duals and
    /// a `(n + m)` divisor for the bound-multiplier scale.
    Ipopt,
    /// A finite-dimensional variant using one-norms of the duals and an `n`-only divisor.
    FiniteDimensional,
}

impl Default for ErrorScaling {
    fn default() -> Self {
        ErrorScaling::Ipopt
    }
}

impl std::str::FromStr for ErrorScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipopt" => Ok(ErrorScaling::Ipopt),
            "finite_dimensional" => Ok(ErrorScaling::FiniteDimensional),
            other => Err(format!("unknown error scaling '{other}'")),
        }
    }
}

impl crate::OptionTrait for ErrorScaling {}

/// The three sub-norms of one KKT evaluation: stationarity (`optim`), primal feasibility
/// (`feas`), and complementarity (`complem`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualNorms {
    pub optim: E,
    pub feas: E,
    pub complem: E,
}

/// Caches the NLP (`mu = 0`) and barrier (`mu > 0`) residual sub-norms for the current iterate.
#[derive(Debug, Clone, Default)]
pub struct Residual {
    pub nlp: ResidualNorms,
    pub barrier: ResidualNorms,
}

#[allow(clippy::too_many_arguments)]
fn complementarity(
    p: &Col<E>,
    l: &Col<E>,
    u: &Col<E>,
    zl: &Col<E>,
    zu: &Col<E>,
    mu: E,
) -> E {
    let mut m = 0.0;
    zip!(p, l, u, zl, zu).for_each(|unzip!(p, l, u, zl, zu)| {
        if l.is_finite() {
            m = E::max(m, ((*p - *l) * *zl - mu).abs());
        }
        if u.is_finite() {
            m = E::max(m, ((*u - *p) * *zu - mu).abs());
        }
    });
    m
}

#[allow(clippy::too_many_arguments)]
fn compute_norms(
    it: &Iterate,
    grad_f: &Col<E>,
    jac_c: SparseColMatRef<I, E>,
    jac_d: SparseColMatRef<I, E>,
    c: &Col<E>,
    d: &Col<E>,
    x_l: &Col<E>,
    x_u: &Col<E>,
    d_l: &Col<E>,
    d_u: &Col<E>,
    mu: E,
) -> ResidualNorms {
    let jct_yc = sparse_transpose_mul(jac_c, it.yc.as_ref());
    let jdt_yd = sparse_transpose_mul(jac_d, it.yd.as_ref());

    let r_x = grad_f - &jct_yc - &jdt_yd - &it.zl + &it.zu;
    let r_s = -&it.yd - &it.vl + &it.vu;

    let optim = E::max(inf_norm(&r_x), inf_norm(&r_s));

    let d_minus_s = d - &it.s;
    let feas = E::max(inf_norm(c), inf_norm(&d_minus_s));

    let complem = E::max(
        complementarity(&it.x, x_l, x_u, &it.zl, &it.zu, mu),
        complementarity(&it.s, d_l, d_u, &it.vl, &it.vu, mu),
    );

    ResidualNorms {
        optim,
        feas,
        complem,
    }
}

impl Residual {
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        it: &Iterate,
        grad_f: &Col<E>,
        jac_c: SparseColMatRef<I, E>,
        jac_d: SparseColMatRef<I, E>,
        c: &Col<E>,
        d: &Col<E>,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
        mu: E,
    ) {
        self.nlp = compute_norms(it, grad_f, jac_c, jac_d, c, d, x_l, x_u, d_l, d_u, 0.0);
        self.barrier = compute_norms(it, grad_f, jac_c, jac_d, c, d, x_l, x_u, d_l, d_u, mu);
    }

    /// The scaling factors `(s_d, s_c)` of section 4.6.
    fn scaling_factors(it: &Iterate, n_eq: usize, n_ineq: usize, s_max: E, scaling: ErrorScaling) -> (E, E) {
        let n = it.x.nrows() + it.s.nrows();
        let m = n_eq + n_ineq;
        match scaling {
            ErrorScaling::Ipopt => {
                let (dual_eq, dual_bounds) = it.total_norm_of_duals();
                let denom = (n + m) as E;
                let s_d = E::max(s_max, (dual_bounds / 4.0 + dual_eq / 2.0) / denom) / s_max;
                let s_c = if n == 0 {
                    0.0
                } else {
                    E::max(s_max, dual_bounds / 4.0) / s_max
                };
                (s_d, s_c)
            }
            ErrorScaling::FiniteDimensional => {
                let (_dual_eq, dual_bounds) = it.norm_one_of_duals();
                let denom = n as E;
                let s_d = if denom == 0.0 {
                    1.0
                } else {
                    E::max(s_max, dual_bounds / denom) / s_max
                };
                let s_c = if n == 0 {
                    0.0
                } else {
                    E::max(s_max, dual_bounds) / s_max
                };
                (s_d, s_c)
            }
        }
    }

    /// The scaled NLP error used by the termination check (section 4.7).
    pub fn scaled_nlp_error(
        &self,
        it: &Iterate,
        n_eq: usize,
        n_ineq: usize,
        s_max: E,
        scaling: ErrorScaling,
    ) -> E {
        let (s_d, s_c) = Self::scaling_factors(it, n_eq, n_ineq, s_max, scaling);
        scaled_error(&self.nlp, s_d, s_c)
    }

    /// The scaled barrier error used by the barrier-update sub-loop (section 4.1 step 4).
    pub fn scaled_barrier_error(
        &self,
        it: &Iterate,
        n_eq: usize,
        n_ineq: usize,
        s_max: E,
        scaling: ErrorScaling,
    ) -> E {
        let (s_d, s_c) = Self::scaling_factors(it, n_eq, n_ineq, s_max, scaling);
        scaled_error(&self.barrier, s_d, s_c)
    }
}

fn scaled_error(norms: &ResidualNorms, s_d: E, s_c: E) -> E {
    let optim_term = if s_d == 0.0 { norms.optim } else { norms.optim / s_d };
    let complem_term = if s_c == 0.0 { norms.complem } else { norms.complem / s_c };
    E::max(optim_term, E::max(norms.feas, complem_term))
}
