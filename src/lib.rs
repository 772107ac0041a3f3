//! Build standalone executables from scripts with a packaging tool.
//!
//! This library provides:
//! - Dependency checking and required-package installation
//! - Packaging-tool command construction and execution
//! - Artifact verification (size, checksum)
//! - Code signing with signtool or osslsigncode
//! - A JSON record of the last build
//!
//! It backs the `exebuild` and `exesign` binaries and can be used directly.

pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod sign;

// Re-export commonly used types
pub use builder::{BuildPipeline, BuildRequest, PipelineOptions};
pub use error::{CliError, ExebuildError, Result};
