//! Request middleware.
//!
//! Purpose: Define middleware components for request lifecycle concerns such as
//! tracing, panic recovery and method restrictions.

pub mod get_only;
pub mod recover;
pub mod trace;

pub use get_only::get_only;
pub use recover::Recover;
pub use trace::Trace;
