//! batchlog - console-mirrored logging with rotating log files
//!
//! Log calls echo to the console immediately and, once a directory is
//! configured, are batched by a single background writer into files capped in
//! both size and count.

pub mod config;
pub mod logging;

pub use logging::{Logger, Severity};
