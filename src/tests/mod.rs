//! End-to-end scenarios driving [`crate::nlp::ipm::FilterIpmDriver`] against hand-written
//! [`crate::nlp::NonlinearProgram`] fixtures, one per terminal status the driver can report.

mod filter_ipm;
