//! A primal-dual interior-point solver for nonlinear programs, using a filter
//! line search for globalization and a limited-memory quasi-Newton Hessian
//! approximation.
//!
//! ## Acknowledgment
//!
//! The algorithmic design — the barrier parameter update strategy, the filter
//! line search, and the augmented system formulation — follows
//!
//! > A. Wächter and L. T. Biegler, "On the Implementation of a Primal-Dual
//! > Interior Point Filter Line Search Algorithm for Large-Scale Nonlinear
//! > Programming", *Mathematical Programming* 106(1), pp. 25-57, 2006.
//!
//! This is an independent implementation written from scratch in Rust.

use std::any::Any;

use dyn_clone::DynClone;
use macros::build_options;

pub mod callback;
pub mod error;
pub mod linalg;
pub mod nlp;
pub mod terminators;

#[cfg(test)]
mod tests;

/// Floating-point element type used throughout the solver.
pub type E = f64;
/// Sparse matrix index type used throughout the solver.
pub type I = usize;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// Terminal states the driver can report from [`nlp::ipm::FilterIpmDriver::run`].
///
/// `InProgress` is never returned from `run`; it is the internal value held while the
/// outer loop is still iterating.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum SolverStatus {
    #[default]
    InProgress,
    /// `err_nlp <= tolerance`.
    Success,
    /// `err_nlp` stayed at or below `acceptable_tolerance` for `acceptable_iterations`
    /// consecutive iterations without reaching `tolerance`.
    AcceptableLevel,
    /// The outer loop reached `max_iter` without converging.
    MaxIterExceeded,
    /// The line search could not find an acceptable step of length `>= 1e-16`.
    StepTooSmall,
    /// The user's iterate callback returned `false`.
    UserStopped,
    /// A Problem, KKT, or Hessian collaborator call returned an error.
    EvaluationError,
    /// A [`terminators::Terminator`] observed Ctrl-C between iterations.
    Interrupted,
    /// A [`terminators::Terminator`] observed the configured time limit elapse.
    TimeLimit,
    /// Self-check / uninitialized catch-all; never returned by a completed `run`.
    Unknown,
}

build_options!(registry_name = OPTION_REGISTRY);
