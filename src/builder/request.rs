//! Build request model and its builder.

use super::error::{Context, Error, Result};
use std::path::{Path, PathBuf};

/// Default directory searched for a local copy of the compression tool.
pub const DEFAULT_UPX_DIR: &str = "upx";

/// Default RFC 3161 timestamp server.
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.digicert.com";

/// Output layout produced by the packaging tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackagingMode {
    /// One self-contained executable
    #[default]
    OneFile,
    /// A folder with the executable and its support files
    Directory,
}

/// Whether the produced program opens a console window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleMode {
    #[default]
    Shown,
    Hidden,
}

/// Extra file bundled with the program (`--add-data SRC DST`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub source: PathBuf,
    pub destination: String,
}

impl DataFile {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Certificate and timestamp options used when signing after a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningSettings {
    /// PKCS#12 certificate; `None` selects a certificate from the system store
    pub cert_path: Option<PathBuf>,
    pub cert_password: Option<String>,
    pub timestamp_url: String,
    pub description: Option<String>,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            cert_path: None,
            cert_password: None,
            timestamp_url: DEFAULT_TIMESTAMP_URL.to_string(),
            description: None,
        }
    }
}

/// Everything needed to drive one packaging run.
///
/// Constructed through [`BuildRequestBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub script: PathBuf,
    /// Output name; defaults to the script's file stem
    pub name: String,
    pub icon: Option<PathBuf>,
    pub mode: PackagingMode,
    pub console: ConsoleMode,
    pub data_files: Vec<DataFile>,
    /// Forwarded verbatim after all generated flags
    pub extra_args: Vec<String>,
    pub compression: bool,
    pub upx_dir: PathBuf,
    pub version_file: Option<PathBuf>,
    pub clean: bool,
    /// Present when the artifact should be signed after a successful build
    pub signing: Option<SigningSettings>,
    /// Abort instead of warning when the icon or version file is missing
    pub strict_paths: bool,
}

impl BuildRequest {
    pub fn builder(script: impl Into<PathBuf>) -> BuildRequestBuilder {
        BuildRequestBuilder::new(script)
    }

    pub fn is_onefile(&self) -> bool {
        self.mode == PackagingMode::OneFile
    }

    pub fn shows_console(&self) -> bool {
        self.console == ConsoleMode::Shown
    }

    /// Fails with [`Error::PathNotFound`] unless the script exists.
    pub fn ensure_script_exists(&self) -> Result<()> {
        if self.script.exists() {
            Ok(())
        } else {
            Err(Error::PathNotFound {
                what: "script file",
                path: self.script.clone(),
            })
        }
    }
}

/// Fluent builder for [`BuildRequest`].
///
/// ```no_run
/// use exebuild::builder::{BuildRequest, DataFile, PackagingMode};
///
/// # fn example() -> exebuild::builder::Result<()> {
/// let request = BuildRequest::builder("app.py")
///     .name("MyApp")
///     .mode(PackagingMode::Directory)
///     .data_file(DataFile::new("assets/logo.png", "assets"))
///     .build()?;
/// assert_eq!(request.name, "MyApp");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BuildRequestBuilder {
    script: PathBuf,
    name: Option<String>,
    icon: Option<PathBuf>,
    mode: PackagingMode,
    console: ConsoleMode,
    data_files: Vec<DataFile>,
    extra_args: Vec<String>,
    compression: bool,
    upx_dir: PathBuf,
    version_file: Option<PathBuf>,
    clean: bool,
    signing: Option<SigningSettings>,
    strict_paths: bool,
}

impl BuildRequestBuilder {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            name: None,
            icon: None,
            mode: PackagingMode::default(),
            console: ConsoleMode::default(),
            data_files: Vec::new(),
            extra_args: Vec::new(),
            compression: true,
            upx_dir: PathBuf::from(DEFAULT_UPX_DIR),
            version_file: None,
            clean: true,
            signing: None,
            strict_paths: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn mode(mut self, mode: PackagingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn console(mut self, console: ConsoleMode) -> Self {
        self.console = console;
        self
    }

    pub fn data_file(mut self, data_file: DataFile) -> Self {
        self.data_files.push(data_file);
        self
    }

    pub fn data_files(mut self, data_files: Vec<DataFile>) -> Self {
        self.data_files = data_files;
        self
    }

    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn upx_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upx_dir = dir.into();
        self
    }

    pub fn version_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.version_file = Some(path.into());
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn signing(mut self, settings: SigningSettings) -> Self {
        self.signing = Some(settings);
        self
    }

    pub fn strict_paths(mut self, strict: bool) -> Self {
        self.strict_paths = strict;
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Fails when no output name is given and none can be derived from the
    /// script path, or when the name is empty.
    pub fn build(self) -> Result<BuildRequest> {
        let name = match self.name {
            Some(name) => name,
            None => default_output_name(&self.script)
                .context("cannot derive an output name from the script path")?,
        };
        if name.trim().is_empty() {
            crate::bail!("output name must not be empty");
        }

        Ok(BuildRequest {
            script: self.script,
            name,
            icon: self.icon,
            mode: self.mode,
            console: self.console,
            data_files: self.data_files,
            extra_args: self.extra_args,
            compression: self.compression,
            upx_dir: self.upx_dir,
            version_file: self.version_file,
            clean: self.clean,
            signing: self.signing,
            strict_paths: self.strict_paths,
        })
    }
}

/// Script base name without its extension (`src/app.py` -> `app`).
pub fn default_output_name(script: &Path) -> Option<String> {
    script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}
