//! Assembly and solution of the primal-dual KKT augmented system.
//!
//! The full (unreduced) primal-dual Newton system has `dzl, dzu, dvl, dvu` eliminated
//! algebraically against the complementarity equations, leaving a symmetric indefinite system in
//! `(dx, ds, dyc, dyd)`:
//!
//! ```text
//! [ W+Sigma_x   0          Jc^T   Jd^T ] [dx ]   [ rhs_x ]
//! [ 0           Sigma_s    0      -I   ] [ds ] = [ rhs_s ]
//! [ Jc          0          0      0    ] [dyc]   [ -c    ]
//! [ Jd          -I         0      0    ] [dyd]   [ -(d-s)]
//! ```
//!
//! where `Sigma_x = zl/(x-xl) + zu/(xu-x)` and `Sigma_s = vl/(s-dl) + vu/(du-s)`, summed only over
//! finite bounds.

use faer::sparse::{SparseColMat, SparseColMatRef, Triplet};
use faer::{Col, unzip, zip};
use problemo::{Problem, ProblemResult};

use crate::E;
use crate::I;
use crate::linalg::solver::SymmetricLinearSolver;
use crate::nlp::iterate::{Iterate, Step};

/// Per-component reciprocal distances to the lower/upper bound, zero where the bound is
/// non-finite, used both to build `Sigma` and to recover the eliminated dual steps.
struct BoundTerms {
    sigma: Col<E>,
    inv_l: Col<E>,
    inv_u: Col<E>,
}

fn bound_terms(p: &Col<E>, l: &Col<E>, u: &Col<E>, zl: &Col<E>, zu: &Col<E>) -> BoundTerms {
    let n = p.nrows();
    let mut sigma = Col::zeros(n);
    let mut inv_l = Col::zeros(n);
    let mut inv_u = Col::zeros(n);
    zip!(
        sigma.as_mut(),
        inv_l.as_mut(),
        inv_u.as_mut(),
        p,
        l,
        u,
        zl,
        zu
    )
    .for_each(|unzip!(sigma, inv_l, inv_u, p, l, u, zl, zu)| {
        if l.is_finite() {
            let il = 1.0 / (*p - *l);
            *inv_l = il;
            *sigma += zl * il;
        }
        if u.is_finite() {
            let iu = 1.0 / (*u - *p);
            *inv_u = iu;
            *sigma += zu * iu;
        }
    });
    BoundTerms { sigma, inv_l, inv_u }
}

/// Complementarity residual `(p - l) * z - mu`, zero on non-finite bounds.
fn comp_residual(p: &Col<E>, bound: &Col<E>, z: &Col<E>, mu: E, lower: bool) -> Col<E> {
    Col::from_fn(p.nrows(), |i| {
        if bound[i].is_finite() {
            if lower {
                (p[i] - bound[i]) * z[i] - mu
            } else {
                (bound[i] - p[i]) * z[i] - mu
            }
        } else {
            0.0
        }
    })
}

pub trait AugmentedSystem<LinSolve: SymmetricLinearSolver> {
    fn new(n_var: usize, n_eq: usize, n_ineq: usize) -> Self;

    /// Assembles the KKT matrix at `it` and factorizes it from scratch.
    #[allow(clippy::too_many_arguments)]
    fn solve(
        &mut self,
        it: &Iterate,
        hessian: SparseColMatRef<I, E>,
        jac_c: SparseColMatRef<I, E>,
        jac_d: SparseColMatRef<I, E>,
        grad_f: &Col<E>,
        c: &Col<E>,
        d: &Col<E>,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
        mu: E,
    ) -> Result<Step, Problem>;
}

pub struct StandardKktSystem<LinSolve: SymmetricLinearSolver> {
    n_var: usize,
    n_eq: usize,
    n_ineq: usize,
    solver: LinSolve,
}

impl<LinSolve: SymmetricLinearSolver> AugmentedSystem<LinSolve> for StandardKktSystem<LinSolve> {
    fn new(n_var: usize, n_eq: usize, n_ineq: usize) -> Self {
        Self {
            n_var,
            n_eq,
            n_ineq,
            solver: LinSolve::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn solve(
        &mut self,
        it: &Iterate,
        hessian: SparseColMatRef<I, E>,
        jac_c: SparseColMatRef<I, E>,
        jac_d: SparseColMatRef<I, E>,
        grad_f: &Col<E>,
        c: &Col<E>,
        d: &Col<E>,
        x_l: &Col<E>,
        x_u: &Col<E>,
        d_l: &Col<E>,
        d_u: &Col<E>,
        mu: E,
    ) -> Result<Step, Problem> {
        let n_var = self.n_var;
        let n_eq = self.n_eq;
        let n_ineq = self.n_ineq;
        let dim = n_var + n_ineq + n_eq + n_ineq;

        let x_terms = bound_terms(&it.x, x_l, x_u, &it.zl, &it.zu);
        let s_terms = bound_terms(&it.s, d_l, d_u, &it.vl, &it.vu);

        let rzl = comp_residual(&it.x, x_l, &it.zl, mu, true);
        let rzu = comp_residual(&it.x, x_u, &it.zu, mu, false);
        let rvl = comp_residual(&it.s, d_l, &it.vl, mu, true);
        let rvu = comp_residual(&it.s, d_u, &it.vu, mu, false);

        let jct_yc = crate::linalg::vector_ops::sparse_transpose_mul(jac_c, it.yc.as_ref());
        let jdt_yd = crate::linalg::vector_ops::sparse_transpose_mul(jac_d, it.yd.as_ref());
        let r_x = grad_f - &jct_yc - &jdt_yd - &it.zl + &it.zu;
        let r_s = -&it.yd - &it.vl + &it.vu;

        let mut rhs = faer::Mat::<E>::zeros(dim, 1);
        for i in 0..n_var {
            rhs[(i, 0)] = -r_x[i] - rzl[i] * x_terms.inv_l[i] + rzu[i] * x_terms.inv_u[i];
        }
        for i in 0..n_ineq {
            rhs[(n_var + i, 0)] = -r_s[i] - rvl[i] * s_terms.inv_l[i] + rvu[i] * s_terms.inv_u[i];
        }
        for i in 0..n_eq {
            rhs[(n_var + n_ineq + i, 0)] = -c[i];
        }
        for i in 0..n_ineq {
            rhs[(n_var + n_ineq + n_eq + i, 0)] = -(d[i] - it.s[i]);
        }

        let mut triplets = Vec::new();

        let h_col_ptr = hessian.symbolic().col_ptr();
        let h_row_idx = hessian.symbolic().row_idx();
        let h_vals = hessian.val();
        for j in 0..n_var {
            for k in h_col_ptr[j]..h_col_ptr[j + 1] {
                triplets.push(Triplet::new(h_row_idx[k], j, h_vals[k]));
            }
            triplets.push(Triplet::new(j, j, x_terms.sigma[j]));
        }
        for j in 0..n_ineq {
            triplets.push(Triplet::new(n_var + j, n_var + j, s_terms.sigma[j]));
        }

        let jc_col_ptr = jac_c.symbolic().col_ptr();
        let jc_row_idx = jac_c.symbolic().row_idx();
        let jc_vals = jac_c.val();
        for j in 0..n_var {
            for k in jc_col_ptr[j]..jc_col_ptr[j + 1] {
                let row = jc_row_idx[k];
                let val = jc_vals[k];
                triplets.push(Triplet::new(n_var + n_ineq + row, j, val));
                triplets.push(Triplet::new(j, n_var + n_ineq + row, val));
            }
        }

        let jd_col_ptr = jac_d.symbolic().col_ptr();
        let jd_row_idx = jac_d.symbolic().row_idx();
        let jd_vals = jac_d.val();
        for j in 0..n_var {
            for k in jd_col_ptr[j]..jd_col_ptr[j + 1] {
                let row = jd_row_idx[k];
                let val = jd_vals[k];
                triplets.push(Triplet::new(n_var + n_ineq + n_eq + row, j, val));
                triplets.push(Triplet::new(j, n_var + n_ineq + n_eq + row, val));
            }
        }

        for j in 0..n_ineq {
            triplets.push(Triplet::new(n_var + n_ineq + n_eq + j, n_var + j, -1.0));
            triplets.push(Triplet::new(n_var + j, n_var + n_ineq + n_eq + j, -1.0));
        }

        let mat = SparseColMat::<I, E>::try_new_from_triplets(dim, dim, &triplets)
            .via(crate::error::SolveError::AugmentedSystemAssembly)?;

        self.solver.analyze(mat.as_ref())?;
        self.solver.factorize(mat.as_ref())?;
        let sol = self.solver.solve(rhs.as_ref())?;

        let mut dir = Step::zeros(n_var, n_eq, n_ineq);
        for i in 0..n_var {
            dir.dx[i] = sol[(i, 0)];
        }
        for i in 0..n_ineq {
            dir.ds[i] = sol[(n_var + i, 0)];
        }
        for i in 0..n_eq {
            dir.dyc[i] = sol[(n_var + n_ineq + i, 0)];
        }
        for i in 0..n_ineq {
            dir.dyd[i] = sol[(n_var + n_ineq + n_eq + i, 0)];
        }

        for i in 0..n_var {
            dir.dzl[i] = -x_terms.inv_l[i] * (rzl[i] + it.zl[i] * dir.dx[i]);
            dir.dzu[i] = x_terms.inv_u[i] * (it.zu[i] * dir.dx[i] - rzu[i]);
        }
        for i in 0..n_ineq {
            dir.dvl[i] = -s_terms.inv_l[i] * (rvl[i] + it.vl[i] * dir.ds[i]);
            dir.dvu[i] = s_terms.inv_u[i] * (it.vu[i] * dir.ds[i] - rvu[i]);
        }

        Ok(dir)
    }
}
