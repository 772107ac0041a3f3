//! Packaging-tool command construction.
//!
//! Turns a [`BuildRequest`] into the exact argument list handed to the
//! packaging tool. Flag order is fixed so identical requests always produce
//! identical commands.

use super::{
    error::{Error, Result},
    platform::Platform,
    request::{BuildRequest, DataFile},
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Default packaging-tool executable name.
pub const DEFAULT_PACKAGER: &str = "pyinstaller";

/// A fully constructed packaging-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerCommand {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments in invocation order; the script path is always last
    pub args: Vec<String>,
    /// Data files dropped because their source does not exist
    pub skipped: Vec<DataFile>,
}

impl PackagerCommand {
    /// Program and arguments joined for display.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Builds packaging-tool commands for one platform.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    platform: Platform,
}

impl CommandBuilder {
    pub fn new(program: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            program: program.into(),
            platform,
        }
    }

    /// Translate `request` into an ordered argument list.
    ///
    /// # Errors
    ///
    /// [`Error::PathNotFound`] for a missing icon or version file in strict
    /// mode; otherwise those are dropped with a warning. Missing data-file
    /// sources never fail the build.
    pub fn build(&self, request: &BuildRequest) -> Result<PackagerCommand> {
        let mut args: Vec<String> = Vec::new();

        if request.clean {
            args.push("--clean".into());
        }

        args.push(if request.is_onefile() { "--onefile" } else { "--onedir" }.into());

        if !request.shows_console() {
            args.push("--noconsole".into());
            if self.platform.needs_windowed_flag() {
                args.push("--windowed".into());
            }
        }

        if let Some(icon) = optional_input(request.icon.as_deref(), "icon file", request.strict_paths)? {
            args.push("--icon".into());
            args.push(icon);
        }

        if let Some(version_file) = optional_input(
            request.version_file.as_deref(),
            "version file",
            request.strict_paths,
        )? {
            args.push("--version-file".into());
            args.push(version_file);
        }

        if request.compression {
            if request.upx_dir.is_dir() {
                args.push("--upx-dir".into());
                args.push(absolute_string(&request.upx_dir)?);
            }
        } else {
            args.push("--noupx".into());
        }

        args.push("--name".into());
        args.push(request.name.clone());

        let mut skipped = Vec::new();
        let separator = self.platform.data_separator();
        for data in &request.data_files {
            if !data.source.exists() {
                log::debug!(
                    "Data file {} does not exist, skipping",
                    data.source.display()
                );
                skipped.push(data.clone());
                continue;
            }
            args.push("--add-data".into());
            args.push(format!(
                "{}{}{}",
                absolute_string(&data.source)?,
                separator,
                data.destination
            ));
        }

        args.extend(request.extra_args.iter().cloned());

        args.push(absolute_string(&request.script)?);

        Ok(PackagerCommand {
            program: self.program.clone(),
            args,
            skipped,
        })
    }
}

/// Resolve an optional auxiliary input to an absolute path string.
///
/// Missing files are dropped with a warning, or rejected when `strict`.
fn optional_input(path: Option<&Path>, what: &'static str, strict: bool) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if path.exists() {
        return absolute_string(path).map(Some);
    }
    if strict {
        return Err(Error::PathNotFound {
            what,
            path: path.to_path_buf(),
        });
    }
    log::warn!("{} {} does not exist, ignoring", what, path.display());
    Ok(None)
}

fn absolute_string(path: &Path) -> Result<String> {
    let absolute = path.absolutize()?;
    absolute
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::GenericError(format!("{} is not valid UTF-8", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::request::{ConsoleMode, PackagingMode};
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hi')").unwrap();
        fs::write(dir.path().join("icon.ico"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("config.ini"), "[x]").unwrap();
        fs::write(dir.path().join("readme.txt"), "read me").unwrap();
        dir
    }

    fn abs(path: &Path) -> String {
        path.absolutize().unwrap().to_str().unwrap().to_string()
    }

    #[test]
    fn flags_follow_fixed_precedence() {
        let dir = fixture();
        let script = dir.path().join("app.py");
        let icon = dir.path().join("icon.ico");
        let upx = dir.path().join("upx");
        fs::create_dir(&upx).unwrap();

        let request = BuildRequest::builder(&script)
            .icon(&icon)
            .console(ConsoleMode::Hidden)
            .upx_dir(&upx)
            .data_file(DataFile::new(dir.path().join("config.ini"), "."))
            .extra_args(vec!["--log-level".into(), "WARN".into()])
            .build()
            .unwrap();

        let command = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&request)
            .unwrap();

        let expected = vec![
            "--clean".to_string(),
            "--onefile".into(),
            "--noconsole".into(),
            "--icon".into(),
            abs(&icon),
            "--upx-dir".into(),
            abs(&upx),
            "--name".into(),
            "app".into(),
            "--add-data".into(),
            format!("{}:.", abs(&dir.path().join("config.ini"))),
            "--log-level".into(),
            "WARN".into(),
            abs(&script),
        ];
        assert_eq!(command.args, expected);
        assert!(command.skipped.is_empty());
    }

    #[test]
    fn identical_requests_build_identical_commands() {
        let dir = fixture();
        let request = BuildRequest::builder(dir.path().join("app.py"))
            .mode(PackagingMode::Directory)
            .data_file(DataFile::new(dir.path().join("config.ini"), "conf"))
            .data_file(DataFile::new(dir.path().join("readme.txt"), "docs"))
            .build()
            .unwrap();
        let builder = CommandBuilder::new("pyinstaller", Platform::Windows);

        let first = builder.build(&request).unwrap();
        let second = builder.build(&request.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_data_sources_are_skipped_in_order() {
        let dir = fixture();
        let request = BuildRequest::builder(dir.path().join("app.py"))
            .data_file(DataFile::new(dir.path().join("config.ini"), "a"))
            .data_file(DataFile::new(dir.path().join("missing.txt"), "dest/"))
            .data_file(DataFile::new(dir.path().join("readme.txt"), "b"))
            .build()
            .unwrap();

        let command = CommandBuilder::new("pyinstaller", Platform::Windows)
            .build(&request)
            .unwrap();

        let data_args: Vec<String> = command
            .args
            .iter()
            .zip(command.args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "--add-data")
            .map(|(_, value)| value.clone())
            .collect();
        assert_eq!(
            data_args,
            vec![
                format!("{};a", abs(&dir.path().join("config.ini"))),
                format!("{};b", abs(&dir.path().join("readme.txt"))),
            ]
        );
        assert!(!command.args.iter().any(|a| a.contains("missing.txt")));
        assert_eq!(command.skipped.len(), 1);
        assert_eq!(command.skipped[0].destination, "dest/");
    }

    #[test]
    fn directory_mode_and_windowed_on_macos() {
        let dir = fixture();
        let request = BuildRequest::builder(dir.path().join("app.py"))
            .mode(PackagingMode::Directory)
            .console(ConsoleMode::Hidden)
            .clean(false)
            .build()
            .unwrap();

        let command = CommandBuilder::new("pyinstaller", Platform::MacOs)
            .build(&request)
            .unwrap();
        assert_eq!(&command.args[..3], &["--onedir", "--noconsole", "--windowed"]);
        assert!(!command.args.contains(&"--clean".to_string()));
    }

    #[test]
    fn disabled_compression_emits_noupx() {
        let dir = fixture();
        let request = BuildRequest::builder(dir.path().join("app.py"))
            .compression(false)
            .build()
            .unwrap();
        let command = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&request)
            .unwrap();
        assert!(command.args.contains(&"--noupx".to_string()));
        assert!(!command.args.contains(&"--upx-dir".to_string()));
    }

    #[test]
    fn missing_icon_is_dropped_unless_strict() {
        let dir = fixture();
        let missing = dir.path().join("nope.ico");

        let lenient = BuildRequest::builder(dir.path().join("app.py"))
            .icon(&missing)
            .build()
            .unwrap();
        let command = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&lenient)
            .unwrap();
        assert!(!command.args.contains(&"--icon".to_string()));

        let strict = BuildRequest::builder(dir.path().join("app.py"))
            .version_file(dir.path().join("version.txt"))
            .strict_paths(true)
            .build()
            .unwrap();
        let err = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&strict)
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { what: "version file", .. }));
    }

    #[test]
    fn script_path_is_always_last() {
        let dir = fixture();
        let script = dir.path().join("app.py");
        let request = BuildRequest::builder(&script)
            .extra_args(vec!["--hidden-import".into(), "json".into()])
            .build()
            .unwrap();
        let command = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&request)
            .unwrap();
        assert_eq!(command.args.last().unwrap(), &abs(&script));
    }

    #[test]
    fn relative_data_sources_are_made_absolute() {
        let dir = fixture();
        let request = BuildRequest::builder(dir.path().join("app.py"))
            .data_file(DataFile::new("Cargo.toml", "."))
            .build()
            .unwrap();

        let command = CommandBuilder::new("pyinstaller", Platform::Linux)
            .build(&request)
            .unwrap();

        let position = command.args.iter().position(|a| a == "--add-data").unwrap();
        let value = &command.args[position + 1];
        assert_eq!(value, &format!("{}:.", abs(Path::new("Cargo.toml"))));
        assert!(Path::new(value.trim_end_matches(":.")).is_absolute());
    }
}
