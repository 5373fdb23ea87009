//! The filter line search state machine of section 4.5: backtracks `alpha` from the
//! fraction-to-the-boundary starting value until the trial point either clears the filter with
//! sufficient decrease, passes the switching/Armijo test, or the step collapses to zero.

use faer::Col;
use problemo::Problem;

use crate::E;
use crate::nlp::NonlinearProgram;
use crate::nlp::ipm::filter::Filter;
use crate::nlp::ipm::log_barrier::LogBarrierProblem;
use crate::nlp::iterate::{Iterate, Step, inf_norm};

const GAMMA_THETA: E = 1e-5;
const GAMMA_PHI: E = 1e-5;
const S_THETA: E = 1.1;
const S_PHI: E = 2.3;
const DELTA: E = 1.0;
const ETA_PHI: E = 1e-4;
const ALPHA_MIN: E = 1e-16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchExit {
    Uninitialized,
    StepTooSmall,
    SufficientDecreaseFarFromSolution,
    SwitchingFailedAcceptedOnSufficientDecrease,
    SwitchingHeldAcceptedOnArmijo,
}

pub struct LineSearchResult {
    pub exit: LineSearchExit,
    pub trial: Iterate,
    pub alpha_primal: E,
    pub alpha_dual: E,
    pub f_trial: E,
    pub c_trial: Col<E>,
    pub d_trial: Col<E>,
    pub theta_trial: E,
    /// Number of trial steps evaluated before this one was accepted (0 on a full step).
    pub ls_count: usize,
}

fn theta_of(c: &Col<E>, d: &Col<E>, s: &Col<E>) -> E {
    let d_minus_s = d - s;
    E::max(inf_norm(c), inf_norm(&d_minus_s))
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    nlp: &mut dyn NonlinearProgram,
    it_curr: &Iterate,
    dir: &Step,
    alpha_primal_start: E,
    alpha_dual: E,
    theta: E,
    theta_min: E,
    filter: &mut Filter,
    log_barrier: &mut LogBarrierProblem,
    mu: E,
    x_l: &Col<E>,
    x_u: &Col<E>,
    d_l: &Col<E>,
    d_u: &Col<E>,
) -> Result<LineSearchResult, Problem> {
    let mut alpha_primal = alpha_primal_start;
    let mut g_cache: Option<E> = None;
    let mut ls_count = 0usize;

    loop {
        if alpha_primal < ALPHA_MIN {
            let trial = it_curr.clone();
            return Ok(LineSearchResult {
                exit: LineSearchExit::StepTooSmall,
                trial,
                alpha_primal,
                alpha_dual,
                f_trial: log_barrier.phi_trial(),
                c_trial: Col::zeros(it_curr.yc.nrows()),
                d_trial: Col::zeros(it_curr.yd.nrows()),
                theta_trial: theta,
                ls_count,
            });
        }

        let mut trial = it_curr.clone();
        trial.take_step_primals(it_curr, dir, alpha_primal, alpha_dual);

        let eval = crate::nlp::evaluate_func_only(nlp, &trial.x, true)?;
        log_barrier.update_trial_func_only(&trial, mu, eval.f, x_l, x_u, d_l, d_u);
        let theta_trial = theta_of(&eval.c, &eval.d, &trial.s);
        let phi = log_barrier.phi();
        let phi_trial = log_barrier.phi_trial();

        let sufficient_decrease_test = |filter: &Filter| -> Option<LineSearchExit> {
            if filter.contains(theta_trial, phi_trial) {
                return None;
            }
            if theta_trial <= (1.0 - GAMMA_THETA) * theta || phi_trial <= phi - GAMMA_PHI * theta {
                Some(LineSearchExit::SufficientDecreaseFarFromSolution)
            } else {
                None
            }
        };

        if theta >= theta_min {
            match sufficient_decrease_test(filter) {
                Some(exit) => {
                    let g = *g_cache.get_or_insert_with(|| log_barrier.directional_derivative(dir));
                    maybe_augment_filter(filter, exit, g, alpha_primal, theta, phi, phi_trial, theta_trial);
                    return Ok(finish(
                        exit,
                        trial,
                        alpha_primal,
                        alpha_dual,
                        eval.f,
                        eval.c,
                        eval.d,
                        theta_trial,
                        ls_count,
                    ));
                }
                None => {
                    alpha_primal *= 0.5;
                    ls_count += 1;
                    continue;
                }
            }
        }

        let g = *g_cache.get_or_insert_with(|| log_barrier.directional_derivative(dir));
        let switching_holds =
            g < 0.0 && alpha_primal * (-g).powf(S_PHI) > DELTA * theta.powf(S_THETA);

        if switching_holds {
            if phi_trial <= phi + ETA_PHI * alpha_primal * g {
                return Ok(finish(
                    LineSearchExit::SwitchingHeldAcceptedOnArmijo,
                    trial,
                    alpha_primal,
                    alpha_dual,
                    eval.f,
                    eval.c,
                    eval.d,
                    theta_trial,
                    ls_count,
                ));
            }
            alpha_primal *= 0.5;
            ls_count += 1;
            continue;
        }

        match sufficient_decrease_test(filter) {
            Some(_) => {
                filter.add(theta_trial, phi_trial);
                return Ok(finish(
                    LineSearchExit::SwitchingFailedAcceptedOnSufficientDecrease,
                    trial,
                    alpha_primal,
                    alpha_dual,
                    eval.f,
                    eval.c,
                    eval.d,
                    theta_trial,
                    ls_count,
                ));
            }
            None => {
                alpha_primal *= 0.5;
                ls_count += 1;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn maybe_augment_filter(
    filter: &mut Filter,
    exit: LineSearchExit,
    g: E,
    alpha_primal: E,
    theta: E,
    phi: E,
    phi_trial: E,
    theta_trial: E,
) {
    if exit != LineSearchExit::SufficientDecreaseFarFromSolution {
        return;
    }
    let switching_holds = g < 0.0 && alpha_primal * (-g).powf(S_PHI) > DELTA * theta.powf(S_THETA);
    let armijo_holds = phi_trial <= phi + ETA_PHI * alpha_primal * g;
    if !switching_holds || !armijo_holds {
        filter.add(theta_trial, phi_trial);
    }
}

#[allow(clippy::too_many_arguments)]
fn finish(
    exit: LineSearchExit,
    trial: Iterate,
    alpha_primal: E,
    alpha_dual: E,
    f_trial: E,
    c_trial: Col<E>,
    d_trial: Col<E>,
    theta_trial: E,
    ls_count: usize,
) -> LineSearchResult {
    LineSearchResult {
        exit,
        trial,
        alpha_primal,
        alpha_dual,
        f_trial,
        c_trial,
        d_trial,
        theta_trial,
        ls_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::sparse::SparseColMat;
    use problemo::Problem;

    struct Unconstrained1d;

    impl NonlinearProgram for Unconstrained1d {
        fn n_var(&self) -> crate::I {
            1
        }
        fn n_eq(&self) -> crate::I {
            0
        }
        fn n_ineq(&self) -> crate::I {
            0
        }
        fn x_l(&self) -> &Col<E> {
            unimplemented!()
        }
        fn x_u(&self) -> &Col<E> {
            unimplemented!()
        }
        fn d_l(&self) -> &Col<E> {
            unimplemented!()
        }
        fn d_u(&self) -> &Col<E> {
            unimplemented!()
        }
        fn starting_point(&self) -> Col<E> {
            Col::from_fn(1, |_| 1.0)
        }
        fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
            Ok(0.5 * x[0] * x[0])
        }
        fn eval_grad_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
            Ok(Col::from_fn(1, |_| x[0]))
        }
        fn eval_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
            Ok(Col::zeros(0))
        }
        fn eval_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
            Ok(Col::zeros(0))
        }
        fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<crate::I, E>, Problem> {
            Ok(SparseColMat::try_new_from_triplets(0, 1, &[]).unwrap())
        }
        fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<crate::I, E>, Problem> {
            Ok(SparseColMat::try_new_from_triplets(0, 1, &[]).unwrap())
        }
    }

    #[test]
    fn full_newton_step_accepted_on_unconstrained_descent() {
        let mut nlp = Unconstrained1d;
        let mut it = Iterate::new(1, 0, 0);
        it.x = Col::from_fn(1, |_| 1.0);
        let empty = Col::zeros(0);

        let mut dir = Step::zeros(1, 0, 0);
        dir.dx = Col::from_fn(1, |_| -1.0);

        let mut filter = Filter::new();
        filter.reinitialize(1e4);
        let mut log_barrier = LogBarrierProblem::new(1, 0);
        log_barrier.update_with_nlp_info(
            &it,
            0.0,
            0.5,
            &Col::from_fn(1, |_| 1.0),
            &empty,
            &empty,
            &empty,
            &empty,
        );

        let result = run(
            &mut nlp, &it, &dir, 1.0, 1.0, 0.0, 1e-4, &mut filter, &mut log_barrier, 0.0, &empty,
            &empty, &empty, &empty,
        )
        .unwrap();

        assert!((result.trial.x[0]).abs() < 1e-12);
        assert_ne!(result.exit, LineSearchExit::StepTooSmall);
    }
}
