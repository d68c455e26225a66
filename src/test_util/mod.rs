//! This module contains utilities that are useful for testing code based on trajectory links.
//!  They are used for testing the transfer functionality itself, but they are also exported for
//!  application testing.
//!
//! Making test utilities part of the crate's regular (non-#[cfg(test)]) code allows integration
//!  tests and downstream crates to use them without a feature flag.

pub mod link;
pub mod message;
pub mod trajectory;
