//! The six end-to-end scenarios, one fixture per terminal status `FilterIpmDriver::run` can
//! report, plus the `max_iter = 0` boundary case.

use faer::Col;
use faer::sparse::{SparseColMat, Triplet};
use problemo::Problem;

use crate::callback::{Callback, NoOpCallback};
use crate::linalg::cholesky::SimplicialSparseCholesky;
use crate::nlp::NonlinearProgram;
use crate::nlp::ipm::FilterIpmDriver;
use crate::nlp::ipm::hessian::CompactLbfgs;
use crate::terminators::Terminator;
use crate::{E, I, Options, SolverStatus};

type Driver = FilterIpmDriver<SimplicialSparseCholesky, CompactLbfgs>;

struct NeverTerminate;

impl Terminator for NeverTerminate {
    fn terminate(&mut self) -> Option<SolverStatus> {
        None
    }
}

fn col(vals: &[E]) -> Col<E> {
    Col::from_fn(vals.len(), |i| vals[i])
}

fn unbounded(n: usize) -> Col<E> {
    Col::from_fn(n, |_| E::NEG_INFINITY)
}

fn unbounded_above(n: usize) -> Col<E> {
    Col::from_fn(n, |_| E::INFINITY)
}

fn empty_sparse(n_var: usize) -> SparseColMat<I, E> {
    SparseColMat::try_new_from_triplets(0, n_var, &[]).unwrap()
}

/// Scenario 1: `min 0.5(x1^2 + x2^2)` from `x0 = (1, 1)`, unconstrained.
struct Unconstrained {
    x_l: Col<E>,
    x_u: Col<E>,
    empty: Col<E>,
}

impl Unconstrained {
    fn new() -> Self {
        Self {
            x_l: unbounded(2),
            x_u: unbounded_above(2),
            empty: Col::zeros(0),
        }
    }
}

impl NonlinearProgram for Unconstrained {
    fn n_var(&self) -> I {
        2
    }
    fn n_eq(&self) -> I {
        0
    }
    fn n_ineq(&self) -> I {
        0
    }
    fn x_l(&self) -> &Col<E> {
        &self.x_l
    }
    fn x_u(&self) -> &Col<E> {
        &self.x_u
    }
    fn d_l(&self) -> &Col<E> {
        &self.empty
    }
    fn d_u(&self) -> &Col<E> {
        &self.empty
    }
    fn starting_point(&self) -> Col<E> {
        col(&[1.0, 1.0])
    }
    fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
        Ok(0.5 * (x[0] * x[0] + x[1] * x[1]))
    }
    fn eval_grad_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[x[0], x[1]]))
    }
    fn eval_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(2))
    }
    fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(2))
    }
}

#[test]
fn unconstrained_converges_to_origin() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = Unconstrained::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::Success);
    assert!(solution.x[0].abs() < 1e-5);
    assert!(solution.x[1].abs() < 1e-5);
    assert!(solution.iterations <= 20);
}

/// Scenario 2: `min x1^2 + x2^2` s.t. `x1 + x2 = 1`, from the already-feasible `x0 = (0.5, 0.5)`.
struct EqualityConstrained {
    x_l: Col<E>,
    x_u: Col<E>,
    empty: Col<E>,
}

impl EqualityConstrained {
    fn new() -> Self {
        Self {
            x_l: unbounded(2),
            x_u: unbounded_above(2),
            empty: Col::zeros(0),
        }
    }
}

impl NonlinearProgram for EqualityConstrained {
    fn n_var(&self) -> I {
        2
    }
    fn n_eq(&self) -> I {
        1
    }
    fn n_ineq(&self) -> I {
        0
    }
    fn x_l(&self) -> &Col<E> {
        &self.x_l
    }
    fn x_u(&self) -> &Col<E> {
        &self.x_u
    }
    fn d_l(&self) -> &Col<E> {
        &self.empty
    }
    fn d_u(&self) -> &Col<E> {
        &self.empty
    }
    fn starting_point(&self) -> Col<E> {
        col(&[0.5, 0.5])
    }
    fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
        Ok(x[0] * x[0] + x[1] * x[1])
    }
    fn eval_grad_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[2.0 * x[0], 2.0 * x[1]]))
    }
    fn eval_c(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[x[0] + x[1] - 1.0]))
    }
    fn eval_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(SparseColMat::try_new_from_triplets(
            1,
            2,
            &[Triplet::new(0, 0, 1.0), Triplet::new(0, 1, 1.0)],
        )
        .unwrap())
    }
    fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(2))
    }
}

#[test]
fn equality_constrained_reaches_the_feasible_stationary_point() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = EqualityConstrained::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::Success);
    assert!((solution.x[0] - 0.5).abs() < 1e-5);
    assert!((solution.x[1] - 0.5).abs() < 1e-5);
    assert!((solution.yc[0] - 1.0).abs() < 1e-3);
}

/// Scenario 3: `min (x - 2)^2` s.t. `0 <= x <= 1`, from `x0 = 0.5`.
struct BoundConstrained {
    x_l: Col<E>,
    x_u: Col<E>,
    empty: Col<E>,
}

impl BoundConstrained {
    fn new() -> Self {
        Self {
            x_l: col(&[0.0]),
            x_u: col(&[1.0]),
            empty: Col::zeros(0),
        }
    }
}

impl NonlinearProgram for BoundConstrained {
    fn n_var(&self) -> I {
        1
    }
    fn n_eq(&self) -> I {
        0
    }
    fn n_ineq(&self) -> I {
        0
    }
    fn x_l(&self) -> &Col<E> {
        &self.x_l
    }
    fn x_u(&self) -> &Col<E> {
        &self.x_u
    }
    fn d_l(&self) -> &Col<E> {
        &self.empty
    }
    fn d_u(&self) -> &Col<E> {
        &self.empty
    }
    fn starting_point(&self) -> Col<E> {
        col(&[0.5])
    }
    fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
        Ok((x[0] - 2.0) * (x[0] - 2.0))
    }
    fn eval_grad_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[2.0 * (x[0] - 2.0)]))
    }
    fn eval_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(1))
    }
    fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(1))
    }
}

#[test]
fn bound_constrained_converges_to_the_active_upper_bound() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = BoundConstrained::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::Success);
    assert!((solution.x[0] - 1.0).abs() < 1e-4);
    assert!(solution.zu[0] > 0.0);
    assert!(solution.zl[0] < 1e-3);
}

/// Scenario 4: `min x1^2 + x2^2` s.t. `x1 + x2 >= 1`, from `x0 = (1, 1)`.
struct InequalityConstrained {
    x_l: Col<E>,
    x_u: Col<E>,
    d_l: Col<E>,
    d_u: Col<E>,
}

impl InequalityConstrained {
    fn new() -> Self {
        Self {
            x_l: unbounded(2),
            x_u: unbounded_above(2),
            d_l: col(&[1.0]),
            d_u: unbounded_above(1),
        }
    }
}

impl NonlinearProgram for InequalityConstrained {
    fn n_var(&self) -> I {
        2
    }
    fn n_eq(&self) -> I {
        0
    }
    fn n_ineq(&self) -> I {
        1
    }
    fn x_l(&self) -> &Col<E> {
        &self.x_l
    }
    fn x_u(&self) -> &Col<E> {
        &self.x_u
    }
    fn d_l(&self) -> &Col<E> {
        &self.d_l
    }
    fn d_u(&self) -> &Col<E> {
        &self.d_u
    }
    fn starting_point(&self) -> Col<E> {
        col(&[1.0, 1.0])
    }
    fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
        Ok(x[0] * x[0] + x[1] * x[1])
    }
    fn eval_grad_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[2.0 * x[0], 2.0 * x[1]]))
    }
    fn eval_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(Col::zeros(0))
    }
    fn eval_d(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[x[0] + x[1]]))
    }
    fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(empty_sparse(2))
    }
    fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(SparseColMat::try_new_from_triplets(
            1,
            2,
            &[Triplet::new(0, 0, 1.0), Triplet::new(0, 1, 1.0)],
        )
        .unwrap())
    }
}

#[test]
fn inequality_constrained_converges_with_the_slack_at_its_bound() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = InequalityConstrained::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::Success);
    assert!((solution.x[0] - 0.5).abs() < 1e-4);
    assert!((solution.x[1] - 0.5).abs() < 1e-4);
    assert!((solution.yd[0] - 1.0).abs() < 1e-3);
    assert!(solution.s[0] < 1e-4);
}

/// Scenario 5: `min x` s.t. `x = 1`, `x <= 0` — structurally infeasible (the two constraints
/// admit no common point).
struct Infeasible {
    x_l: Col<E>,
    x_u: Col<E>,
    d_l: Col<E>,
    d_u: Col<E>,
}

impl Infeasible {
    fn new() -> Self {
        Self {
            x_l: unbounded(1),
            x_u: unbounded_above(1),
            d_l: Col::from_fn(1, |_| E::NEG_INFINITY),
            d_u: col(&[0.0]),
        }
    }
}

impl NonlinearProgram for Infeasible {
    fn n_var(&self) -> I {
        1
    }
    fn n_eq(&self) -> I {
        1
    }
    fn n_ineq(&self) -> I {
        1
    }
    fn x_l(&self) -> &Col<E> {
        &self.x_l
    }
    fn x_u(&self) -> &Col<E> {
        &self.x_u
    }
    fn d_l(&self) -> &Col<E> {
        &self.d_l
    }
    fn d_u(&self) -> &Col<E> {
        &self.d_u
    }
    fn starting_point(&self) -> Col<E> {
        col(&[0.5])
    }
    fn eval_f(&mut self, x: &Col<E>, _new_x: bool) -> Result<E, Problem> {
        Ok(x[0])
    }
    fn eval_grad_f(&mut self, _x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[1.0]))
    }
    fn eval_c(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[x[0] - 1.0]))
    }
    fn eval_d(&mut self, x: &Col<E>, _new_x: bool) -> Result<Col<E>, Problem> {
        Ok(col(&[x[0]]))
    }
    fn eval_jac_c(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(SparseColMat::try_new_from_triplets(1, 1, &[Triplet::new(0, 0, 1.0)]).unwrap())
    }
    fn eval_jac_d(&mut self, _x: &Col<E>, _new_x: bool) -> Result<SparseColMat<I, E>, Problem> {
        Ok(SparseColMat::try_new_from_triplets(1, 1, &[Triplet::new(0, 0, 1.0)]).unwrap())
    }
}

#[test]
fn infeasible_problem_collapses_the_line_search() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = Infeasible::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::StepTooSmall);
}

/// A callback that asks the driver to stop as soon as it has seen iterate `k = 3`.
struct StopAtThree {
    calls: Vec<usize>,
    solution_calls: usize,
    solution_k: Option<usize>,
}

impl Callback for StopAtThree {
    fn new(_options: &Options) -> Self {
        Self {
            calls: Vec::new(),
            solution_calls: 0,
            solution_k: None,
        }
    }

    fn iterate(
        &mut self,
        k: usize,
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
        self.calls.push(k);
        k < 3
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
        self.solution_calls += 1;
        self.solution_k = self.calls.last().copied();
    }
}

#[test]
fn user_callback_stop_at_iteration_three_reports_user_stopped() {
    let options = Options::new();
    let mut driver = Driver::new(&options);
    let mut nlp = Unconstrained::new();
    let mut callback = StopAtThree::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::UserStopped);
    assert_eq!(callback.solution_calls, 1);
    assert_eq!(callback.solution_k, Some(3));
    assert_eq!(*callback.calls.last().unwrap(), 3);
}

/// `max_iter = 0` returns `MaxIterExceeded` without taking a step: the very first check inside
/// the loop is `k >= max_iter`.
#[test]
fn zero_max_iter_exits_without_taking_a_step() {
    let mut options = Options::new();
    options.set_option::<usize>("max_iter", 0).unwrap();
    let mut driver = Driver::new(&options);
    let mut nlp = Unconstrained::new();
    let mut callback = NoOpCallback::new(&options);
    let mut terminator = NeverTerminate;

    let solution = driver.run(&mut nlp, &mut callback, &mut terminator).unwrap();

    assert_eq!(solution.status, SolverStatus::MaxIterExceeded);
    assert_eq!(solution.iterations, 0);
    assert_eq!(solution.x[0], 1.0);
    assert_eq!(solution.x[1], 1.0);
}
