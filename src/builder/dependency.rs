//! Packaging-tool dependency checks.
//!
//! Required packages are installed or upgraded through the interpreter's
//! package manager on a best-effort basis. Only the packaging tool itself is
//! mandatory: if it cannot be resolved afterwards the build is refused.

use super::{
    error::{Error, Result},
    platform::Platform,
};
use semver::Version;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Name of the optional compression tool.
pub const COMPRESSION_TOOL: &str = "upx";

/// A package the packaging tool needs, with the lowest acceptable version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredPackage {
    pub name: &'static str,
    pub min_version: &'static str,
}

impl RequiredPackage {
    /// Installer requirement string, e.g. `pyinstaller>=5.0.0`.
    pub fn requirement(&self) -> String {
        format!("{}>={}", self.name, self.min_version)
    }
}

pub const REQUIRED_PACKAGES: &[RequiredPackage] = &[
    RequiredPackage {
        name: "pyinstaller",
        min_version: "5.0.0",
    },
    RequiredPackage {
        name: "pyinstaller-hooks-contrib",
        min_version: "2023.0.0",
    },
];

/// What to do about one required package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Upgrade { installed: Version },
    Satisfied { installed: Version },
}

/// Decide the action for a package given its installed version.
pub fn plan_action(installed: Option<&Version>, minimum: &Version) -> PackageAction {
    match installed {
        None => PackageAction::Install,
        Some(v) if v < minimum => PackageAction::Upgrade { installed: v.clone() },
        Some(v) => PackageAction::Satisfied { installed: v.clone() },
    }
}

/// Parse package-manager style versions (`6.3`, `2024.9`, `5.13.2.post1`).
///
/// Only the leading numeric components are kept; missing ones are zero.
pub fn parse_version_lenient(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches(['v', 'V']);
    let mut parts = [0u64; 3];
    let mut seen = 0;
    for (slot, component) in parts.iter_mut().zip(raw.split('.')) {
        let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        *slot = digits.parse().ok()?;
        seen += 1;
        if digits.len() != component.len() {
            break;
        }
    }
    if seen == 0 {
        return None;
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Extract the `Version:` field from `pip show` output.
pub fn parse_pip_show(output: &str) -> Option<Version> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .and_then(parse_version_lenient)
}

/// Outcome of a dependency check.
#[derive(Debug, Clone)]
pub struct DependencyReport {
    /// Resolved packaging-tool executable
    pub packager: PathBuf,
    /// Interpreter version, `unknown` if it could not be determined
    pub python_version: String,
    /// Compression tool, if one was found
    pub compression_tool: Option<PathBuf>,
}

/// Checks and installs what the packaging tool needs.
#[derive(Debug, Clone)]
pub struct DependencyChecker {
    python: PathBuf,
    packager: PathBuf,
    install_packages: bool,
    platform: Platform,
}

impl DependencyChecker {
    pub fn new(python: impl Into<PathBuf>, packager: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            packager: packager.into(),
            install_packages: true,
            platform: Platform::current(),
        }
    }

    /// Platform whose executable naming applies to local tool lookups.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Skip the install/upgrade step (the packaging tool is still resolved).
    pub fn install_packages(mut self, enabled: bool) -> Self {
        self.install_packages = enabled;
        self
    }

    /// Run the full check.
    ///
    /// # Errors
    ///
    /// [`Error::MissingDependency`] when the packaging tool cannot be resolved.
    /// Package-manager failures are only logged.
    pub async fn check(&self, compression: bool, upx_dir: &Path) -> Result<DependencyReport> {
        if self.install_packages {
            for package in REQUIRED_PACKAGES {
                if let Err(e) = self.ensure_package(package).await {
                    log::warn!("Could not ensure {}: {}", package.requirement(), e);
                }
            }
        } else {
            log::debug!("Package installation skipped");
        }

        let packager = self.resolve_packager()?;
        log::info!("✓ Packaging tool available: {}", packager.display());

        let compression_tool = if compression {
            let tool = find_compression_tool(upx_dir, self.platform);
            match &tool {
                Some(path) => log::info!("✓ Compression tool available: {}", path.display()),
                None => log::debug!(
                    "{} not found in {} or on PATH; the executable will not be compressed",
                    COMPRESSION_TOOL,
                    upx_dir.display()
                ),
            }
            tool
        } else {
            None
        };

        Ok(DependencyReport {
            packager,
            python_version: self.python_version().await,
            compression_tool,
        })
    }

    /// Install or upgrade one package as needed.
    pub async fn ensure_package(&self, package: &RequiredPackage) -> Result<PackageAction> {
        let minimum = parse_version_lenient(package.min_version).ok_or_else(|| {
            Error::GenericError(format!("invalid minimum version for {}", package.name))
        })?;
        let installed = self.installed_version(package.name).await;
        let action = plan_action(installed.as_ref(), &minimum);

        match &action {
            PackageAction::Install => {
                log::info!("Installing {}", package.requirement());
                self.pip_install(package, false).await?;
            }
            PackageAction::Upgrade { installed } => {
                log::info!(
                    "Upgrading {} {} to {}",
                    package.name,
                    installed,
                    package.requirement()
                );
                self.pip_install(package, true).await?;
            }
            PackageAction::Satisfied { installed } => {
                log::debug!("{} {} satisfies >= {}", package.name, installed, minimum);
            }
        }
        Ok(action)
    }

    async fn installed_version(&self, name: &str) -> Option<Version> {
        let output = Command::new(&self.python)
            .args(["-m", "pip", "show", name])
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_pip_show(&String::from_utf8_lossy(&output.stdout))
    }

    async fn pip_install(&self, package: &RequiredPackage, upgrade: bool) -> Result<()> {
        let mut command = Command::new(&self.python);
        command.args(["-m", "pip", "install"]);
        if upgrade {
            command.arg("--upgrade");
        }
        command.arg(package.requirement());

        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: format!("{} -m pip install", self.python.display()),
                error,
            })?;

        if !output.status.success() {
            return Err(Error::GenericError(format!(
                "pip install {} failed: {}",
                package.requirement(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Resolve the packaging tool on the search path (or as an explicit path).
    pub fn resolve_packager(&self) -> Result<PathBuf> {
        which::which(&self.packager).map_err(|e| Error::MissingDependency {
            name: self.packager.display().to_string(),
            hint: format!(
                "{e}. Install it with `{} -m pip install pyinstaller`",
                self.python.display()
            ),
        })
    }

    /// Interpreter version reported by `--version`, or `unknown`.
    pub async fn python_version(&self) -> String {
        let output = match Command::new(&self.python)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => output,
            _ => return "unknown".to_string(),
        };

        // Older interpreters print the version on stderr
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let version = text.trim().trim_start_matches("Python").trim();
        if version.is_empty() {
            "unknown".to_string()
        } else {
            version.to_string()
        }
    }
}

/// Default interpreter executable for the host.
pub fn default_python() -> &'static str {
    match Platform::current() {
        Platform::Windows => "python",
        _ => "python3",
    }
}

/// Locate the compression tool in `upx_dir` or on the search path.
pub fn find_compression_tool(upx_dir: &Path, platform: Platform) -> Option<PathBuf> {
    let local = upx_dir.join(platform.executable_name(COMPRESSION_TOOL));
    if local.is_file() {
        return Some(local);
    }
    which::which(COMPRESSION_TOOL).ok()
}
