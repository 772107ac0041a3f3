//! Error taxonomy for build, dependency, config and signing operations.
//!
//! Non-fatal conditions (config persistence, signing) share the same enum as
//! fatal ones; callers decide with [`Error::is_fatal`] whether to abort.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing, running or post-processing a build.
#[derive(Debug, Error)]
pub enum Error {
    /// Config file exists but is not a JSON object.
    #[error("config file {} is not valid JSON: {reason}", path.display())]
    ConfigParse {
        /// Config file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Config file could not be written.
    #[error("failed to write config file {}: {error}", path.display())]
    ConfigWrite {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        error: std::io::Error,
    },

    /// A required packaging tool is unavailable after the dependency check.
    #[error("missing dependency '{name}': {hint}")]
    MissingDependency {
        /// Tool or package name
        name: String,
        /// How to fix it
        hint: String,
    },

    /// A required input path does not exist.
    #[error("{what} not found: {}", path.display())]
    PathNotFound {
        /// Human-readable description of the path ("script file", "icon file", ...)
        what: &'static str,
        /// The missing path
        path: PathBuf,
    },

    /// The packaging tool exited with a non-zero status.
    #[error("packaging tool failed ({}): {}", describe_code(*code), stderr.trim())]
    BuildFailed {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// The packaging tool exited with zero but the expected artifact is absent.
    #[error("packaging tool reported success but no artifact exists at {}", path.display())]
    ArtifactMissing {
        /// Expected artifact location
        path: PathBuf,
    },

    /// No signing utility could be located.
    #[error("{tool} not found (searched: {})", display_paths(searched))]
    SignToolNotFound {
        /// Tool name
        tool: String,
        /// Candidate paths that were probed
        searched: Vec<PathBuf>,
    },

    /// Signing cannot be performed on this platform with the given request.
    #[error("code signing without a certificate file is not supported on this platform ({platform})")]
    SignUnsupported {
        /// Platform identifier
        platform: String,
    },

    /// The signing utility exited with a non-zero status.
    #[error("signing tool failed ({}): {}", describe_code(*code), stderr.trim())]
    SignFailed {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },

    /// The run was aborted by Ctrl-C.
    #[error("interrupted by user")]
    Interrupted,

    /// A subprocess could not be spawned or awaited.
    #[error("failed to run `{command}`: {error}")]
    CommandFailed {
        /// Program that failed to start
        command: String,
        /// Underlying I/O error
        error: std::io::Error,
    },

    /// Filesystem error with the action and path that triggered it.
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Action being performed
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        error: std::io::Error,
    },

    /// Raw I/O error.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Directory traversal error.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// An error annotated with what was being attempted.
    #[error("{0}: {1}")]
    Context(String, Box<Error>),

    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Whether this error must abort the run.
    ///
    /// Config persistence and signing problems are reported but leave an
    /// already-produced artifact valid.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ConfigParse { .. }
            | Error::ConfigWrite { .. }
            | Error::SignToolNotFound { .. }
            | Error::SignUnsupported { .. }
            | Error::SignFailed { .. } => false,
            Error::Context(_, inner) => inner.is_fatal(),
            _ => true,
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "search path".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Attach the filesystem action and path to an I/O error.
pub trait ErrorExt<T> {
    fn fs_context(self, context: &str, path: &Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: &Path) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context: context.to_string(),
            path: path.to_path_buf(),
            error,
        })
    }
}

/// Annotate a failure with what was being attempted.
pub trait Context<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| Error::Context(context.into(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(context.into()))
    }
}

/// Return early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::builder::Error::GenericError(format!($($arg)*)))
    };
}
