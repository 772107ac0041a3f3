//! Packaging-tool build orchestration.
//!
//! This module turns a [`BuildRequest`] into a verified artifact:
//!
//! - [`request`] - Build request model and builder
//! - [`command`] - Packaging-tool argument construction
//! - [`dependency`] - Required package installation and tool discovery
//! - [`runner`] - Subprocess execution and artifact verification
//! - [`artifact`] - Artifact paths, sizes and checksums
//! - [`pipeline`] - The end-to-end [`BuildPipeline`]
//!
//! # Example
//!
//! ```no_run
//! use exebuild::builder::{BuildPipeline, BuildRequest, PipelineOptions};
//! use exebuild::cli::OutputManager;
//!
//! # async fn example() -> exebuild::builder::Result<()> {
//! let request = BuildRequest::builder("app.py").name("MyApp").build()?;
//! let pipeline = BuildPipeline::new(PipelineOptions::default(), OutputManager::default());
//! let report = pipeline.run(&request).await?;
//! println!("{} ({} bytes)", report.result.artifact.display(), report.result.size);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod command;
pub mod dependency;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod request;
pub mod runner;

pub use command::{CommandBuilder, PackagerCommand};
pub use dependency::{DependencyChecker, DependencyReport};
pub use error::{Error, Result};
pub use pipeline::{BuildPipeline, BuildReport, PipelineOptions};
pub use platform::Platform;
pub use request::{
    BuildRequest, BuildRequestBuilder, ConsoleMode, DataFile, PackagingMode, SigningSettings,
};
pub use runner::{BuildResult, BuildRunner};
