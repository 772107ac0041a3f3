//! Top-level error types for the command-line front ends.
//!
//! Domain failures live in [`crate::builder::Error`]; this module wraps them
//! together with argument and I/O problems so `main` has one type to report.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, ExebuildError>;

/// Main error type reaching the process boundary
#[derive(Error, Debug)]
pub enum ExebuildError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Build, dependency, config or signing errors
    #[error("{0}")]
    Build(#[from] crate::builder::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ExebuildError {
    /// Actionable hints printed after the error message
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::builder::Error as BuildError;

        match self {
            ExebuildError::Build(BuildError::MissingDependency { .. }) => vec![
                "Install the packaging tool: python -m pip install pyinstaller".to_string(),
                "Or point --packager / EXEBUILD_PACKAGER at an existing executable".to_string(),
            ],
            ExebuildError::Build(BuildError::PathNotFound { .. }) => {
                vec!["Check the path; relative paths are resolved from the current directory".to_string()]
            }
            ExebuildError::Build(BuildError::BuildFailed { .. }) => {
                vec!["Re-run with --debug to see the packaging tool's full output".to_string()]
            }
            ExebuildError::Build(BuildError::ArtifactMissing { .. }) => vec![
                "The packaging tool exited cleanly but wrote nothing to dist/".to_string(),
                "Check for a custom --distpath in the extra arguments".to_string(),
            ],
            ExebuildError::Build(BuildError::SignToolNotFound { .. }) => {
                vec!["Install the Windows SDK (signtool) or osslsigncode".to_string()]
            }
            ExebuildError::Cli(_) => vec!["Run with --help for usage".to_string()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Error as BuildError;

    #[test]
    fn missing_dependency_has_install_hint() {
        let err = ExebuildError::from(BuildError::MissingDependency {
            name: "pyinstaller".into(),
            hint: "not found".into(),
        });
        assert!(err.recovery_suggestions()[0].contains("pip install pyinstaller"));
    }

    #[test]
    fn invalid_arguments_point_at_help() {
        let err = ExebuildError::from(CliError::InvalidArguments {
            reason: "--name cannot be empty".into(),
        });
        assert_eq!(err.to_string(), "CLI error: Invalid arguments: --name cannot be empty");
        assert_eq!(err.recovery_suggestions(), vec!["Run with --help for usage"]);
    }
}
