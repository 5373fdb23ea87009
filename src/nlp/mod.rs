//! The nonlinear program collaborator and the primal-dual iterate it is evaluated against.

pub mod ipm;
pub mod iterate;

use faer::{Col, sparse::SparseColMat};
use problemo::Problem;

use crate::{E, I};

/// A nonlinear program of the form
///
/// ```text
///   min   f(x)
///   s.t.  c(x)  = 0
///         d_l  <= d(x) <= d_u
///         x_l  <= x    <= x_u
/// ```
///
/// A caller implements this trait once per problem. Every evaluation method takes an explicit
/// `new_x` flag: the driver sets it `true` only on the first call for a given `x`, in the group
/// `f, grad_f, c, d, jac_c, jac_d` (always in that order), allowing the implementation to cache
/// intermediate quantities shared across the group. Bound vectors may contain `E::NEG_INFINITY` /
/// `E::INFINITY` components for one-sided or absent bounds.
pub trait NonlinearProgram {
    /// Number of decision variables.
    fn n_var(&self) -> I;
    /// Number of equality constraints.
    fn n_eq(&self) -> I;
    /// Number of inequality constraints (equivalently, the number of slack variables).
    fn n_ineq(&self) -> I;

    /// Lower bounds on `x`, length `n_var`.
    fn x_l(&self) -> &Col<E>;
    /// Upper bounds on `x`, length `n_var`.
    fn x_u(&self) -> &Col<E>;
    /// Lower bounds on `d(x)`, length `n_ineq`.
    fn d_l(&self) -> &Col<E>;
    /// Upper bounds on `d(x)`, length `n_ineq`.
    fn d_u(&self) -> &Col<E>;

    /// A feasible-ish starting point for `x`; projected into the bounds by the driver before use.
    fn starting_point(&self) -> Col<E>;

    fn eval_f(&mut self, x: &Col<E>, new_x: bool) -> Result<E, Problem>;
    fn eval_grad_f(&mut self, x: &Col<E>, new_x: bool) -> Result<Col<E>, Problem>;
    fn eval_c(&mut self, x: &Col<E>, new_x: bool) -> Result<Col<E>, Problem>;
    fn eval_d(&mut self, x: &Col<E>, new_x: bool) -> Result<Col<E>, Problem>;
    fn eval_jac_c(&mut self, x: &Col<E>, new_x: bool) -> Result<SparseColMat<I, E>, Problem>;
    fn eval_jac_d(&mut self, x: &Col<E>, new_x: bool) -> Result<SparseColMat<I, E>, Problem>;
}

/// All derivative information gathered by one call to [`evaluate`].
pub struct NlpEvaluation {
    pub f: E,
    pub grad_f: Col<E>,
    pub c: Col<E>,
    pub d: Col<E>,
    pub jac_c: SparseColMat<I, E>,
    pub jac_d: SparseColMat<I, E>,
}

/// Evaluates `f, grad_f, c, d, jac_c, jac_d` at `x` in the order the `new_x` contract requires.
pub fn evaluate(
    nlp: &mut dyn NonlinearProgram,
    x: &Col<E>,
    new_x: bool,
) -> Result<NlpEvaluation, Problem> {
    let f = nlp.eval_f(x, new_x)?;
    let grad_f = nlp.eval_grad_f(x, false)?;
    let c = nlp.eval_c(x, false)?;
    let d = nlp.eval_d(x, false)?;
    let jac_c = nlp.eval_jac_c(x, false)?;
    let jac_d = nlp.eval_jac_d(x, false)?;
    Ok(NlpEvaluation {
        f,
        grad_f,
        c,
        d,
        jac_c,
        jac_d,
    })
}

/// Evaluates only `f, c, d` at a trial `x`, for use inside the line search.
pub struct NlpFuncEvaluation {
    pub f: E,
    pub c: Col<E>,
    pub d: Col<E>,
}

pub fn evaluate_func_only(
    nlp: &mut dyn NonlinearProgram,
    x: &Col<E>,
    new_x: bool,
) -> Result<NlpFuncEvaluation, Problem> {
    let f = nlp.eval_f(x, new_x)?;
    let c = nlp.eval_c(x, false)?;
    let d = nlp.eval_d(x, false)?;
    Ok(NlpFuncEvaluation { f, c, d })
}
