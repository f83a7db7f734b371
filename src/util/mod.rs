//! Utility types and functions for meshport.
//!
//! This module contains fundamental types used throughout the library:
//! - [`ScalarType`] - Enum of property storage types
//! - [`Error`] / [`Result`] - Error handling
//! - [`Event`] / [`EventSink`] - Structured progress reporting

mod error;
mod events;
mod scalar;

pub use error::*;
pub use events::*;
pub use scalar::*;
