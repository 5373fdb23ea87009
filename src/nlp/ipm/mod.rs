//! The filter interior-point driver: the outer barrier-parameter schedule, the starting
//! procedure, and the iteration-loop state machine that ties the other collaborators in this
//! module together.
//!
//! ## Acknowledgment
//!
//! The algorithmic design — the barrier parameter update strategy, the filter line search, and
//! the augmented system formulation — follows
//!
//! > A. Wächter and L. T. Biegler, "On the Implementation of a Primal-Dual Interior Point Filter
//! > Line Search Algorithm for Large-Scale Nonlinear Programming", *Mathematical Programming*
//! > 106(1), pp. 25-57, 2006.
//!
//! This is an independent implementation written from scratch in Rust.

pub mod augmented_system;
pub mod duals_update;
pub mod filter;
pub mod hessian;
pub mod line_search;
pub mod log_barrier;
pub mod residual;

use std::marker::PhantomData;

use faer::Col;
use faer::sparse::SparseColMatRef;
use macros::{explicit_options, use_option};
use problemo::Problem;

use crate::callback::Callback;
use crate::error::SolveError;
use crate::linalg::solver::SymmetricLinearSolver;
use crate::linalg::vector_ops::sparse_transpose_mul;
use crate::nlp::NonlinearProgram;
use crate::nlp::ipm::augmented_system::{AugmentedSystem, StandardKktSystem};
use crate::nlp::ipm::duals_update::{DualsInit, DualsUpdateKind};
use crate::nlp::ipm::filter::Filter;
use crate::nlp::ipm::hessian::HessianUpdate;
use crate::nlp::ipm::line_search::LineSearchExit;
use crate::nlp::ipm::log_barrier::LogBarrierProblem;
use crate::nlp::ipm::residual::{ErrorScaling, Residual};
use crate::nlp::iterate::{Iterate, Step, inf_norm};
use crate::terminators::Terminator;
use crate::{E, I, SolverStatus};

/// `grad_f - Jc^T yc - Jd^T yd`, the stationarity part of the NLP Lagrangian gradient, used only
/// to form limited-memory Hessian secant pairs between consecutive accepted iterates.
fn grad_lagrangian_x(
    grad_f: &Col<E>,
    jac_c: SparseColMatRef<I, E>,
    jac_d: SparseColMatRef<I, E>,
    yc: &Col<E>,
    yd: &Col<E>,
) -> Col<E> {
    let jct_yc = sparse_transpose_mul(jac_c, yc.as_ref());
    let jdt_yd = sparse_transpose_mul(jac_d, yd.as_ref());
    grad_f - &jct_yc - &jdt_yd
}

fn theta_of(c: &Col<E>, d: &Col<E>, s: &Col<E>) -> E {
    let d_minus_s = d - s;
    E::max(inf_norm(c), inf_norm(&d_minus_s))
}

/// The final primal-dual point returned from a completed [`FilterIpmDriver::run`], copied out of
/// the driver's internal buffers rather than left for the caller to peek at through a reference.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolverStatus,
    pub x: Col<E>,
    pub s: Col<E>,
    pub yc: Col<E>,
    pub yd: Col<E>,
    pub zl: Col<E>,
    pub zu: Col<E>,
    pub vl: Col<E>,
    pub vu: Col<E>,
    pub f: E,
    pub iterations: usize,
}

/// The primal-dual interior-point driver with a filter line search, generic over the symmetric
/// KKT solve and the Hessian approximation it assembles into the KKT matrix.
///
/// Holds only configuration. Every per-problem collaborator (the iterate, the filter, the log
/// barrier, the residual cache, the KKT system, the Hessian approximation) is constructed fresh
/// inside [`FilterIpmDriver::run`], since their dimensions depend on the [`NonlinearProgram`]
/// passed to that call, not on anything known at driver-construction time.
#[explicit_options(name = Options)]
#[use_option(name = "mu0", type_ = E, default = "0.1", description = "Initial value of the barrier parameter mu.")]
#[use_option(name = "kappa_mu", type_ = E, default = "0.2", description = "Linear reduction factor applied to mu at each barrier update.")]
#[use_option(name = "theta_mu", type_ = E, default = "1.5", description = "Superlinear exponent applied to mu at each barrier update.")]
#[use_option(name = "tau_min", type_ = E, default = "0.99", description = "Minimum fraction-to-the-boundary parameter.")]
#[use_option(name = "tolerance", type_ = E, default = "1e-8", description = "Scaled NLP error tolerance for a Success exit.")]
#[use_option(name = "kappa_eps", type_ = E, default = "10.0", description = "Barrier tolerance, expressed as a multiple of mu.")]
#[use_option(name = "kappa1", type_ = E, default = "1e-2", description = "First starting-point projection constant.")]
#[use_option(name = "kappa2", type_ = E, default = "1e-2", description = "Second starting-point projection constant.")]
#[use_option(name = "smax", type_ = E, default = "100.0", description = "Cap on the dual magnitude used by the error-scaling factors.")]
#[use_option(name = "max_iter", type_ = usize, default = "3000", description = "Maximum number of outer iterations.")]
#[use_option(name = "acceptable_iterations", type_ = usize, default = "15", description = "Consecutive iterations at or below the acceptable tolerance before an AcceptableLevel exit.")]
#[use_option(name = "acceptable_tolerance", type_ = E, default = "1e-6", description = "Looser scaled NLP error tolerance for an acceptable-but-not-optimal exit.")]
#[use_option(name = "duals_update_type", type_ = crate::nlp::ipm::duals_update::DualsUpdateKind, default = "lsq", description = "Rule used to advance the equality duals after an accepted step.")]
#[use_option(name = "duals_initialization", type_ = crate::nlp::ipm::duals_update::DualsInit, default = "lsq", description = "Rule used to initialize the equality duals during the starting procedure.")]
#[use_option(name = "secant_memory_len", type_ = usize, default = "6", description = "Number of curvature pairs retained by the limited-memory Hessian approximation.")]
pub struct FilterIpmDriver<LinSolve: SymmetricLinearSolver, HU: HessianUpdate> {
    error_scaling: ErrorScaling,
    _lin_solve: PhantomData<LinSolve>,
    _hessian: PhantomData<HU>,
}

impl<LinSolve: SymmetricLinearSolver, HU: HessianUpdate> FilterIpmDriver<LinSolve, HU> {
    pub fn new(options: &crate::Options) -> Self {
        Self {
            options: options.into(),
            error_scaling: ErrorScaling::default(),
            _lin_solve: PhantomData,
            _hessian: PhantomData,
        }
    }

    /// Overrides the error-scaling convention of section 4.6. Not itself a registered option,
    /// since it changes the meaning of the tolerances rather than a tunable within one
    /// convention.
    pub fn with_error_scaling(mut self, scaling: ErrorScaling) -> Self {
        self.error_scaling = scaling;
        self
    }

    /// Runs the driver to completion against `nlp`, reporting progress through `callback` and
    /// polling `terminator` for out-of-band stop requests between iterations.
    ///
    /// An `Err` surfaces a fatal failure from a Problem, KKT, or Hessian collaborator; the
    /// solution callback still fires once beforehand with whatever partial iterate was on hand
    /// when the failure occurred, with status [`SolverStatus::EvaluationError`].
    pub fn run(
        &mut self,
        nlp: &mut dyn NonlinearProgram,
        callback: &mut dyn Callback,
        terminator: &mut dyn Terminator,
    ) -> Result<Solution, Problem> {
        let n_var = nlp.n_var();
        let n_eq = nlp.n_eq();
        let n_ineq = nlp.n_ineq();

        let x_l = nlp.x_l().clone();
        let x_u = nlp.x_u().clone();
        let d_l = nlp.d_l().clone();
        let d_u = nlp.d_u().clone();
        if x_l.nrows() != n_var || x_u.nrows() != n_var {
            return Err(SolveError::DimensionMismatch {
                expected: n_var,
                got: x_l.nrows().max(x_u.nrows()),
            }
            .into());
        }
        if d_l.nrows() != n_ineq || d_u.nrows() != n_ineq {
            return Err(SolveError::DimensionMismatch {
                expected: n_ineq,
                got: d_l.nrows().max(d_u.nrows()),
            }
            .into());
        }

        let kappa1 = self.options.kappa1;
        let kappa2 = self.options.kappa2;
        let tau_min = self.options.tau_min;
        let smax = self.options.smax;
        let kappa_eps = self.options.kappa_eps;
        let kappa_mu = self.options.kappa_mu;
        let theta_mu = self.options.theta_mu;
        let tolerance = self.options.tolerance;
        let acceptable_tolerance = self.options.acceptable_tolerance;
        let acceptable_iterations = self.options.acceptable_iterations;
        let max_iter = self.options.max_iter;
        let scaling = self.error_scaling;

        // Starting procedure (section 4.1, steps 1-3).
        let mut it = Iterate::new(n_var, n_eq, n_ineq);
        it.x = nlp.starting_point();
        if it.x.nrows() != n_var {
            return Err(SolveError::DimensionMismatch {
                expected: n_var,
                got: it.x.nrows(),
            }
            .into());
        }
        for i in 0..n_var {
            if !it.x[i].is_finite() {
                return Err(SolveError::InvalidStartingPoint { index: i }.into());
            }
        }
        it.project_primals_x_into_bounds(&x_l, &x_u, kappa1, kappa2);

        let mut current_eval = crate::nlp::evaluate(nlp, &it.x, true)?;
        it.determine_slacks(&current_eval.d, &d_l, &d_u, kappa1, kappa2);

        it.set_bounds_duals_to_constant(1.0);
        let mut mu = self.options.mu0;
        let mut tau = E::max(tau_min, 1.0 - mu);
        match self.options.duals_initialization {
            DualsInit::Lsq => {
                let base = it.clone();
                let zero_dir = Step::zeros(n_var, n_eq, n_ineq);
                DualsUpdateKind::Lsq.advance(
                    &mut it,
                    &base,
                    &zero_dir,
                    &current_eval.grad_f,
                    current_eval.jac_c.as_ref(),
                    current_eval.jac_d.as_ref(),
                    n_eq,
                    n_ineq,
                    0.0,
                    mu,
                    &x_l,
                    &x_u,
                    &d_l,
                    &d_u,
                );
            }
            DualsInit::Zero => {
                it.set_equality_duals_to_constant(0.0);
            }
        }

        let theta_0 = theta_of(&current_eval.c, &current_eval.d, &it.s);
        let theta_max = 1e4 * E::max(1.0, theta_0);
        let theta_min = 1e-4 * E::max(1.0, theta_0);

        let mut filter = Filter::new();
        filter.reinitialize(theta_max);
        let mut log_barrier = LogBarrierProblem::new(n_var, n_ineq);
        let mut res = Residual::default();
        let mut hessian = HU::new(n_var, self.options.secant_memory_len);
        let mut kkt = StandardKktSystem::<LinSolve>::new(n_var, n_eq, n_ineq);

        let mut prev_x: Option<Col<E>> = None;
        let mut prev_grad_lag_x: Option<Col<E>> = None;
        let mut last_alpha_primal: E = 0.0;
        let mut last_alpha_dual: E = 0.0;
        let mut last_ls_count: usize = 0;
        let mut acceptable_count: usize = 0;

        terminator.initialize();

        let mut status = SolverStatus::InProgress;
        let mut failure: Option<Problem> = None;
        let mut k: usize = 0;

        macro_rules! eval_or_break {
            ($expr:expr) => {
                match $expr {
                    Ok(v) => v,
                    Err(e) => {
                        status = SolverStatus::EvaluationError;
                        failure = Some(e);
                        break;
                    }
                }
            };
        }

        loop {
            if k >= max_iter {
                status = SolverStatus::MaxIterExceeded;
                break;
            }

            current_eval = eval_or_break!(crate::nlp::evaluate(nlp, &it.x, true));

            res.update(
                &it,
                &current_eval.grad_f,
                current_eval.jac_c.as_ref(),
                current_eval.jac_d.as_ref(),
                &current_eval.c,
                &current_eval.d,
                &x_l,
                &x_u,
                &d_l,
                &d_u,
                mu,
            );
            let err_nlp = res.scaled_nlp_error(&it, n_eq, n_ineq, smax, scaling);

            let keep_going = callback.iterate(
                k,
                current_eval.f,
                &it.x,
                &it.zl,
                &it.zu,
                &current_eval.c,
                &current_eval.d,
                &it.yc,
                &it.yd,
                res.nlp.feas,
                res.nlp.optim,
                mu,
                last_alpha_dual,
                last_alpha_primal,
                last_ls_count,
            );
            if !keep_going {
                status = SolverStatus::UserStopped;
                break;
            }

            if err_nlp <= tolerance {
                status = SolverStatus::Success;
                break;
            }
            if err_nlp <= acceptable_tolerance {
                acceptable_count += 1;
                if acceptable_count >= acceptable_iterations {
                    status = SolverStatus::AcceptableLevel;
                    break;
                }
            } else {
                acceptable_count = 0;
            }

            if let Some(terminated) = terminator.terminate() {
                status = terminated;
                break;
            }

            // Barrier parameter update (section 4.1, step 4): keep reducing mu while the
            // current iterate already satisfies the barrier subproblem at this mu.
            loop {
                res.update(
                    &it,
                    &current_eval.grad_f,
                    current_eval.jac_c.as_ref(),
                    current_eval.jac_d.as_ref(),
                    &current_eval.c,
                    &current_eval.d,
                    &x_l,
                    &x_u,
                    &d_l,
                    &d_u,
                    mu,
                );
                let err_barrier = res.scaled_barrier_error(&it, n_eq, n_ineq, smax, scaling);
                if err_barrier > kappa_eps * mu {
                    break;
                }
                let mu_new = E::max(tolerance / 10.0, E::min(kappa_mu * mu, mu.powf(theta_mu)));
                if (mu_new - mu).abs() < 1e-16 {
                    break;
                }
                mu = mu_new;
                tau = E::max(tau_min, 1.0 - mu);
                filter.reinitialize(theta_max);
            }

            let grad_lag_x = grad_lagrangian_x(
                &current_eval.grad_f,
                current_eval.jac_c.as_ref(),
                current_eval.jac_d.as_ref(),
                &it.yc,
                &it.yd,
            );
            if let (Some(px), Some(pg)) = (&prev_x, &prev_grad_lag_x) {
                let s = &it.x - px;
                let y = &grad_lag_x - pg;
                hessian.update(&s, &y);
            }
            prev_x = Some(it.x.clone());
            prev_grad_lag_x = Some(grad_lag_x);

            let hessian_mat = hessian.to_sparse();
            log_barrier.update_with_nlp_info(
                &it,
                mu,
                current_eval.f,
                &current_eval.grad_f,
                &x_l,
                &x_u,
                &d_l,
                &d_u,
            );
            let theta = theta_of(&current_eval.c, &current_eval.d, &it.s);

            let dir = eval_or_break!(kkt.solve(
                &it,
                hessian_mat.as_ref(),
                current_eval.jac_c.as_ref(),
                current_eval.jac_d.as_ref(),
                &current_eval.grad_f,
                &current_eval.c,
                &current_eval.d,
                &x_l,
                &x_u,
                &d_l,
                &d_u,
                mu,
            ));

            let (alpha_primal_max, alpha_dual) =
                it.fraction_to_the_bdry(&dir, &x_l, &x_u, &d_l, &d_u, tau);

            let ls = eval_or_break!(line_search::run(
                nlp,
                &it,
                &dir,
                alpha_primal_max,
                alpha_dual,
                theta,
                theta_min,
                &mut filter,
                &mut log_barrier,
                mu,
                &x_l,
                &x_u,
                &d_l,
                &d_u,
            ));

            if ls.exit == LineSearchExit::StepTooSmall {
                status = SolverStatus::StepTooSmall;
                break;
            }

            let mut trial = ls.trial;
            let eval_trial = eval_or_break!(crate::nlp::evaluate(nlp, &trial.x, true));
            self.options.duals_update_type.advance(
                &mut trial,
                &it,
                &dir,
                &eval_trial.grad_f,
                eval_trial.jac_c.as_ref(),
                eval_trial.jac_d.as_ref(),
                n_eq,
                n_ineq,
                ls.alpha_dual,
                mu,
                &x_l,
                &x_u,
                &d_l,
                &d_u,
            );

            last_alpha_primal = ls.alpha_primal;
            last_alpha_dual = ls.alpha_dual;
            last_ls_count = ls.ls_count;
            it = trial;
            k += 1;
        }

        callback.solution(
            status,
            &it.x,
            &it.zl,
            &it.zu,
            &current_eval.c,
            &current_eval.d,
            &it.yc,
            &it.yd,
            current_eval.f,
        );

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(Solution {
            status,
            x: it.x,
            s: it.s,
            yc: it.yc,
            yd: it.yd,
            zl: it.zl,
            zu: it.zu,
            vl: it.vl,
            vu: it.vu,
            f: current_eval.f,
            iterations: k,
        })
    }
}
