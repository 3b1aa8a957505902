//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `docqueue` crate.
//!
//! This module centralizes reusable components: the error taxonomy, the
//! identifier generator and the logging bootstrap.

pub mod error;
pub mod ids;
pub mod logging;
