//! Hooks invoked by the driver once per iteration and exactly once on exit.

use faer::Col;
use macros::build_option_enum;

use crate::{E, Options, SolverStatus};

/// Per-iteration and exit-time hooks into the solver.
pub trait Callback {
    /// Creates a new callback from solver options.
    fn new(options: &Options) -> Self
    where
        Self: Sized;

    /// Called at the end of each outer iteration. Returning `false` requests the driver stop
    /// with [`SolverStatus::UserStopped`].
    #[allow(clippy::too_many_arguments)]
    fn iterate(
        &mut self,
        k: usize,
        f: E,
        x: &Col<E>,
        zl: &Col<E>,
        zu: &Col<E>,
        c: &Col<E>,
        d: &Col<E>,
        yc: &Col<E>,
        yd: &Col<E>,
        err_feas: E,
        err_optim: E,
        mu: E,
        alpha_dual: E,
        alpha_primal: E,
        ls_count: usize,
    ) -> bool;

    /// Invoked exactly once on exit, for every exit path, with whatever iterate is available at
    /// that point.
    #[allow(clippy::too_many_arguments)]
    fn solution(
        &mut self,
        status: SolverStatus,
        x: &Col<E>,
        zl: &Col<E>,
        zu: &Col<E>,
        c: &Col<E>,
        d: &Col<E>,
        yc: &Col<E>,
        yd: &Col<E>,
        f: E,
    );
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &Options) -> Self {
        Self {}
    }

    fn iterate(
        &mut self,
        _k: usize,
        _f: E,
        _x: &Col<E>,
        _zl: &Col<E>,
        _zu: &Col<E>,
        _c: &Col<E>,
        _d: &Col<E>,
        _yc: &Col<E>,
        _yd: &Col<E>,
        _err_feas: E,
        _err_optim: E,
        _mu: E,
        _alpha_dual: E,
        _alpha_primal: E,
        _ls_count: usize,
    ) -> bool {
        true
    }

    fn solution(
        &mut self,
        _status: SolverStatus,
        _x: &Col<E>,
        _zl: &Col<E>,
        _zu: &Col<E>,
        _c: &Col<E>,
        _d: &Col<E>,
        _yc: &Col<E>,
        _yd: &Col<E>,
        _f: E,
    ) {
    }
}

/// Prints a one-line convergence summary to stdout each iteration, and a final status line on
/// exit.
pub struct ConvergenceOutput {}

impl Callback for ConvergenceOutput {
    fn new(_options: &Options) -> Self {
        Self {}
    }

    fn iterate(
        &mut self,
        k: usize,
        f: E,
        _x: &Col<E>,
        _zl: &Col<E>,
        _zu: &Col<E>,
        _c: &Col<E>,
        _d: &Col<E>,
        _yc: &Col<E>,
        _yd: &Col<E>,
        err_feas: E,
        err_optim: E,
        mu: E,
        alpha_dual: E,
        alpha_primal: E,
        ls_count: usize,
    ) -> bool {
        println!(
            "| {:4} | {:<12.6e} | {:<8.2e} | {:<8.2e} | {:<8.2e} | {:<8.2e} | {:<8.2e} | {:4} |",
            k, f, err_feas, err_optim, mu, alpha_primal, alpha_dual, ls_count
        );
        true
    }

    fn solution(
        &mut self,
        status: SolverStatus,
        _x: &Col<E>,
        _zl: &Col<E>,
        _zu: &Col<E>,
        _c: &Col<E>,
        _d: &Col<E>,
        _yc: &Col<E>,
        _yd: &Col<E>,
        f: E,
    ) {
        let diagnostic = if status == SolverStatus::StepTooSmall {
            " (step collapsed below 1e-16 -- check gradient accuracy or problem feasibility)"
        } else {
            ""
        };
        println!("solver finished with status {:?}, f = {:.6e}{}", status, f, diagnostic);
    }
}

build_option_enum!(
    trait_ = Callback,
    name = "Callbacks",
    variants = (NoOpCallback, ConvergenceOutput),
    new_arguments = (&Options,),
    doc_header = "An enum representing different callbacks for the optimization solver. Each variant corresponds to a specific callback strategy."
);
