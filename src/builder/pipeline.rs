//! Build pipeline orchestration.
//!
//! Sequences one build strictly in order:
//!
//! 1. Verify the script exists (before any subprocess runs)
//! 2. Check dependencies and resolve the packaging tool
//! 3. Remove previous outputs when a clean build is requested
//! 4. Construct the packaging-tool command
//! 5. Run it and verify the artifact
//! 6. Sign the artifact when requested
//!
//! Steps 1-5 are fatal on failure. A signing failure is carried in the
//! [`BuildReport`] and leaves the artifact and build status untouched.

use super::{
    artifact::{WORK_DIR, expected_artifact, remove_path, signable_file},
    command::{CommandBuilder, DEFAULT_PACKAGER, PackagerCommand},
    dependency::{DependencyChecker, default_python},
    error::Result,
    platform::Platform,
    request::{BuildRequest, SigningSettings},
    runner::{BuildResult, BuildRunner},
};
use crate::cli::OutputManager;
use crate::sign::{SignRequest, Signer};
use std::path::PathBuf;

/// Environment-level settings shared by every build.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Interpreter used for package management and version reporting
    pub python: PathBuf,
    /// Packaging-tool executable name or path
    pub packager: PathBuf,
    /// Directory the packaging tool runs in; artifacts land in `<dir>/dist`
    pub working_dir: PathBuf,
    pub platform: Platform,
    /// Install or upgrade required packages before building
    pub install_packages: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            python: PathBuf::from(default_python()),
            packager: PathBuf::from(DEFAULT_PACKAGER),
            working_dir: PathBuf::from("."),
            platform: Platform::current(),
            install_packages: true,
        }
    }
}

/// Everything a successful build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub result: BuildResult,
    pub command: PackagerCommand,
    pub python_version: String,
    /// `None` when signing was not requested
    pub signing: Option<Result<()>>,
}

impl BuildReport {
    pub fn signed(&self) -> bool {
        matches!(self.signing, Some(Ok(())))
    }
}

/// Drives one build from request to verified (and optionally signed) artifact.
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    options: PipelineOptions,
    output: OutputManager,
}

impl BuildPipeline {
    pub fn new(options: PipelineOptions, output: OutputManager) -> Self {
        Self { options, output }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn run(&self, request: &BuildRequest) -> Result<BuildReport> {
        request.ensure_script_exists()?;

        self.output.section("Checking dependencies");
        let dependencies = DependencyChecker::new(&self.options.python, &self.options.packager)
            .install_packages(self.options.install_packages)
            .platform(self.options.platform)
            .check(request.compression, &request.upx_dir)
            .await?;
        if request.compression && dependencies.compression_tool.is_none() {
            self.output
                .warn("compression tool (upx) not found; the executable will not be compressed");
        }

        if request.clean {
            self.clean_previous(request).await;
        }

        let command = CommandBuilder::new(&dependencies.packager, self.options.platform)
            .build(request)?;
        for skipped in &command.skipped {
            self.output.warn(&format!(
                "data file {} not found, skipping",
                skipped.source.display()
            ));
        }

        self.output.section(&format!("Building {}", request.name));
        self.output.verbose(&command.display());
        let runner = BuildRunner::new(&self.options.working_dir, self.options.platform);
        let result = runner.run(&command, request, &self.output).await?;
        self.output.success(&format!(
            "Build finished: {} ({:.2} MB in {:.2}s)",
            result.artifact.display(),
            result.size_mb(),
            result.elapsed.as_secs_f64()
        ));

        let signing = match &request.signing {
            Some(settings) => Some(self.sign(request, &result, settings).await),
            None => None,
        };

        Ok(BuildReport {
            result,
            command,
            python_version: dependencies.python_version,
            signing,
        })
    }

    async fn sign(
        &self,
        request: &BuildRequest,
        result: &BuildResult,
        settings: &SigningSettings,
    ) -> Result<()> {
        self.output.section("Signing");
        let target = signable_file(&result.artifact, request, self.options.platform);
        let sign_request = SignRequest::from_settings(target, settings);

        match Signer::new(self.options.platform).sign(&sign_request).await {
            Ok(()) => {
                self.output
                    .success(&format!("Signed {}", sign_request.artifact.display()));
                Ok(())
            }
            Err(e) => {
                self.output.warn(&format!("signing failed: {e}"));
                Err(e)
            }
        }
    }

    /// Remove the previous work directory and artifact; failures only warn.
    async fn clean_previous(&self, request: &BuildRequest) {
        let targets = [
            self.options.working_dir.join(WORK_DIR).join(&request.name),
            expected_artifact(&self.options.working_dir, request, self.options.platform),
        ];
        for target in targets {
            match remove_path(&target).await {
                Ok(()) => log::debug!("Cleaned {}", target.display()),
                Err(e) => self.output.warn(&format!("could not clean {}: {e}", target.display())),
            }
        }
    }
}
