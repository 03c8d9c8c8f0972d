//! Utility functions and supporting infrastructure.
//!
//! Provides the id-word bit reader, error types and the static lookup tables
//! used to expand non-linear samples.

pub mod bitstream_io;
pub mod errors;
pub mod tables;
