use derive_more::{Display, Error};

/// Errors raised directly by the driver, as opposed to errors surfaced from a collaborator
/// (Problem, KKT, or Hessian), which propagate through [`problemo::Problem`] untouched.
#[derive(Debug, Display, Error, PartialEq)]
pub enum SolveError {
    #[display("bound vectors have length {got} but the problem declares {expected} variables")]
    DimensionMismatch { expected: usize, got: usize },

    #[display("starting point produced a non-finite value at index {index}")]
    InvalidStartingPoint { index: usize },

    #[display("option '{name}' is not registered")]
    UnknownOption { name: String },

    #[display("failed to assemble the KKT augmented system")]
    AugmentedSystemAssembly,
}
