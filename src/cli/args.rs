//! Command line argument parsing and validation.
//!
//! Flags map one-to-one onto [`BuildRequest`] fields; environment-level
//! settings (interpreter, packaging tool, working directory) map onto
//! [`PipelineOptions`].

use crate::builder::{
    self, BuildRequest, ConsoleMode, DataFile, PackagingMode, PipelineOptions, SigningSettings,
    request::{DEFAULT_TIMESTAMP_URL, DEFAULT_UPX_DIR},
};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Package a script into a standalone executable
#[derive(Parser, Debug, Clone)]
#[command(
    name = "exebuild",
    version,
    about = "Package a script into a standalone executable and optionally sign it",
    long_about = "Runs the packaging tool (pyinstaller) with the given options, verifies the produced
artifact, optionally signs it, and records the build in a JSON config file.

Usage:
  exebuild app.py
  exebuild app.py --name MyApp --icon app.ico --window --data assets assets
  exebuild app.py --dir --sign --cert cert.pfx --config build.json -- --hidden-import json

Exit code 0 = artifact exists (signing problems are reported but do not change it)."
)]
pub struct Args {
    /// Script to package
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Output name (defaults to the script name without extension)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Icon file (.ico on Windows, .icns on macOS)
    #[arg(long, value_name = "PATH")]
    pub icon: Option<PathBuf>,

    /// Produce a directory instead of a single file
    #[arg(long)]
    pub dir: bool,

    /// Hide the console window
    #[arg(long)]
    pub window: bool,

    /// Extra file to bundle; may be repeated
    #[arg(long, num_args = 2, value_names = ["SRC", "DST"], action = ArgAction::Append)]
    pub data: Vec<String>,

    /// Sign the executable after a successful build
    #[arg(long)]
    pub sign: bool,

    /// Disable compression of the executable
    #[arg(long = "no-upx", visible_alias = "no-compress")]
    pub no_upx: bool,

    /// Directory holding a local copy of the compression tool
    #[arg(long, value_name = "DIR", default_value = DEFAULT_UPX_DIR)]
    pub upx_dir: PathBuf,

    /// Version-information file embedded in the executable (Windows)
    #[arg(long, value_name = "PATH")]
    pub version_file: Option<PathBuf>,

    /// Keep the packaging tool's cache and previous outputs
    #[arg(long)]
    pub no_clean: bool,

    /// JSON file recording the last build
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output and debug logging
    #[arg(long)]
    pub debug: bool,

    /// Fail instead of warning when the icon or version file is missing
    #[arg(long)]
    pub strict: bool,

    /// Do not install or upgrade required packages
    #[arg(long)]
    pub skip_deps: bool,

    /// Interpreter used for package management
    #[arg(long, env = "EXEBUILD_PYTHON", value_name = "PATH")]
    pub python: Option<PathBuf>,

    /// Packaging tool executable
    #[arg(long, env = "EXEBUILD_PACKAGER", value_name = "PATH")]
    pub packager: Option<PathBuf>,

    /// Code-signing certificate (.pfx)
    #[arg(long, value_name = "PATH", requires = "sign")]
    pub cert: Option<PathBuf>,

    /// Certificate password
    #[arg(
        long,
        env = "EXEBUILD_CERT_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub cert_password: Option<String>,

    /// RFC 3161 timestamp server
    #[arg(long, value_name = "URL", default_value = DEFAULT_TIMESTAMP_URL)]
    pub timestamp_url: String,

    /// Description embedded in the signature
    #[arg(long, value_name = "TEXT", requires = "sign")]
    pub sign_description: Option<String>,

    /// Arguments passed verbatim to the packaging tool (after `--`)
    #[arg(last = true, value_name = "EXTRA")]
    pub extra: Vec<String>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.script.as_os_str().is_empty() {
            return Err("Script path cannot be empty".to_string());
        }

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("--name cannot be empty".to_string());
            }
            if name.contains(['/', '\\']) {
                return Err(format!("--name must not contain path separators: {name}"));
            }
        }

        if self.sign {
            url::Url::parse(&self.timestamp_url)
                .map_err(|e| format!("Invalid --timestamp-url {}: {}", self.timestamp_url, e))?;
        }

        Ok(())
    }

    /// `--data` values grouped into source/destination pairs.
    pub fn data_files(&self) -> Vec<DataFile> {
        self.data
            .chunks_exact(2)
            .map(|pair| DataFile::new(&pair[0], pair[1].clone()))
            .collect()
    }

    /// Build request described by these arguments.
    pub fn to_request(&self) -> builder::Result<BuildRequest> {
        let mut request = BuildRequest::builder(&self.script)
            .mode(if self.dir {
                PackagingMode::Directory
            } else {
                PackagingMode::OneFile
            })
            .console(if self.window {
                ConsoleMode::Hidden
            } else {
                ConsoleMode::Shown
            })
            .data_files(self.data_files())
            .extra_args(self.extra.clone())
            .compression(!self.no_upx)
            .upx_dir(&self.upx_dir)
            .clean(!self.no_clean)
            .strict_paths(self.strict);

        if let Some(name) = &self.name {
            request = request.name(name);
        }
        if let Some(icon) = &self.icon {
            request = request.icon(icon);
        }
        if let Some(version_file) = &self.version_file {
            request = request.version_file(version_file);
        }
        if self.sign {
            request = request.signing(SigningSettings {
                cert_path: self.cert.clone(),
                cert_password: self.cert_password.clone(),
                timestamp_url: self.timestamp_url.clone(),
                description: self.sign_description.clone(),
            });
        }

        request.build()
    }

    /// Pipeline settings described by these arguments.
    pub fn pipeline_options(&self) -> std::io::Result<PipelineOptions> {
        let mut options = PipelineOptions {
            working_dir: std::env::current_dir()?,
            install_packages: !self.skip_deps,
            ..PipelineOptions::default()
        };
        if let Some(python) = &self.python {
            options.python = python.clone();
        }
        if let Some(packager) = &self.packager {
            options.packager = packager.clone();
        }
        Ok(options)
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.debug, false),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}
