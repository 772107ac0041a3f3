//! Command line interface for exebuild and exesign.
//!
//! Parses arguments, initializes logging, drives the [`BuildPipeline`] and
//! persists the build record. Exit codes: 0 when the artifact exists (even if
//! signing failed), 1 for any build failure or interruption.

mod args;
mod output;
mod sign;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;
pub use sign::SignArgs;

use crate::builder::{BuildPipeline, BuildReport, BuildRequest, Error as BuildError};
use crate::config::{ConfigStore, Document, LastBuild, record_last_build};
use crate::error::{CliError, ExebuildError, Result};

/// Main CLI entry point for `exebuild`
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.debug);
    let runtime = RuntimeConfig::from(&args);

    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    until_interrupted(execute(&args, &runtime), ctrl_c(), runtime.output()).await
}

/// Run `work` unless `interrupt` resolves first; dropping `work` kills any
/// child process it spawned.
async fn until_interrupted<W, I>(work: W, interrupt: I, output: &OutputManager) -> Result<i32>
where
    W: Future<Output = Result<i32>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        code = work => code,
        () = interrupt => {
            output.error(&format!("build {}", BuildError::Interrupted));
            Ok(1)
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::debug!("Ctrl-C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}

/// Main CLI entry point for `exesign`
pub async fn run_sign() -> Result<i32> {
    let args = SignArgs::parse_args();
    init_logging(args.debug);
    sign::execute(&args).await
}

/// Initialize env_logger; `RUST_LOG` overrides the level chosen here.
fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

async fn execute(args: &Args, runtime: &RuntimeConfig) -> Result<i32> {
    let output = runtime.output();
    let request = args.to_request()?;

    let store = args.config.as_ref().map(ConfigStore::new);
    let mut document = match &store {
        Some(store) => load_config(store, output).await,
        None => Document::new(),
    };

    let pipeline = BuildPipeline::new(args.pipeline_options()?, output.clone());
    let report = match pipeline.run(&request).await {
        Ok(report) => report,
        Err(e) => {
            report_failure(&ExebuildError::from(e), output);
            return Ok(1);
        }
    };

    print_summary(&request, &report, output);

    if let Some(store) = &store {
        persist(store, &mut document, &request, &report, output).await;
    }

    Ok(0)
}

async fn load_config(store: &ConfigStore, output: &OutputManager) -> Document {
    match store.try_load().await {
        Ok(document) => document,
        Err(e) => {
            output.warn(&format!("{e}; starting with an empty config"));
            Document::new()
        }
    }
}

/// Record the build; a write failure is reported but does not fail the run.
async fn persist(
    store: &ConfigStore,
    document: &mut Document,
    request: &BuildRequest,
    report: &BuildReport,
    output: &OutputManager,
) {
    let record = LastBuild::new(request, &report.result, &report.python_version);
    let saved = match record_last_build(document, &record) {
        Ok(()) => store.save(document).await,
        Err(e) => Err(e),
    };
    match saved {
        Ok(()) => output.verbose(&format!("Build recorded in {}", store.path().display())),
        Err(e) => output.warn(&e.to_string()),
    }
}

fn print_summary(request: &BuildRequest, report: &BuildReport, output: &OutputManager) {
    let result = &report.result;
    output.section("Summary");
    output.indent(&format!("Output:   {}", result.artifact.display()));
    output.indent(&format!(
        "Mode:     {}",
        if request.is_onefile() { "one file" } else { "directory" }
    ));
    output.indent(&format!("Size:     {:.2} MB", result.size_mb()));
    output.indent(&format!("Time:     {:.2}s", result.elapsed.as_secs_f64()));
    output.indent(&format!("Platform: {}", result.platform));
    output.indent(&format!("Python:   {}", report.python_version));
    output.indent(&format!("SHA-256:  {}", result.sha256));

    match &report.signing {
        None => {}
        Some(Ok(())) => output.indent("Signed:   yes"),
        Some(Err(_)) => output.indent("Signed:   no (the unsigned executable was kept)"),
    }
}

fn report_failure(error: &ExebuildError, output: &OutputManager) {
    output.error(&error.to_string());

    for suggestion in error.recovery_suggestions() {
        output.progress(&suggestion);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupt_aborts_running_build_with_exit_one() {
        let code = until_interrupted(
            std::future::pending::<Result<i32>>(),
            std::future::ready(()),
            &OutputManager::new(false, true),
        )
        .await
        .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn finished_build_keeps_its_exit_code() {
        let code = until_interrupted(
            async { Ok::<i32, ExebuildError>(0) },
            std::future::pending::<()>(),
            &OutputManager::new(false, true),
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_kills_the_packaging_tool() {
        use crate::builder::{BuildRunner, PackagerCommand, Platform};

        let dir = tempfile::tempdir().unwrap();
        let output = OutputManager::new(false, true);
        let command = PackagerCommand {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), "sleep 30; mkdir -p dist; touch dist/app".into()],
            skipped: Vec::new(),
        };
        let request = BuildRequest::builder("app.py").build().unwrap();
        let runner = BuildRunner::new(dir.path(), Platform::Linux);
        let work = async {
            runner.run(&command, &request, &output).await?;
            Ok::<i32, ExebuildError>(0)
        };
        let interrupt = tokio::time::sleep(std::time::Duration::from_millis(100));

        let started = std::time::Instant::now();
        let code = until_interrupted(work, interrupt, &output).await.unwrap();

        assert_eq!(code, 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(!dir.path().join("dist").exists());
    }
}
