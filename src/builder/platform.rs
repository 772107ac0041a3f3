//! Host platform identification.
//!
//! Everything that differs between operating systems (artifact extension,
//! data-file separator, windowed flag, signing strategy) is keyed off
//! [`Platform`] so it can be exercised for any OS from tests.

use std::fmt;

/// Operating system family the packaging tool targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    /// Any other Unix-like system
    Other,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// Identifier recorded in build metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Other => std::env::consts::OS,
        }
    }

    /// Extension appended to one-file executables.
    pub fn executable_extension(&self) -> Option<&'static str> {
        match self {
            Platform::Windows => Some("exe"),
            _ => None,
        }
    }

    /// Separator between source and destination in `--add-data`.
    pub fn data_separator(&self) -> char {
        match self {
            Platform::Windows => ';',
            _ => ':',
        }
    }

    /// Whether hiding the console also requires `--windowed` (app bundle output).
    pub fn needs_windowed_flag(&self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// File name of an executable called `stem` on this platform.
    pub fn executable_name(&self, stem: &str) -> String {
        match self.executable_extension() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_executables_get_exe_extension() {
        assert_eq!(Platform::Windows.executable_name("app"), "app.exe");
        assert_eq!(Platform::Linux.executable_name("app"), "app");
        assert_eq!(Platform::MacOs.executable_name("app"), "app");
    }

    #[test]
    fn data_separator_follows_path_list_convention() {
        assert_eq!(Platform::Windows.data_separator(), ';');
        assert_eq!(Platform::Linux.data_separator(), ':');
        assert_eq!(Platform::MacOs.data_separator(), ':');
    }

    #[test]
    fn only_macos_needs_windowed_flag() {
        assert!(Platform::MacOs.needs_windowed_flag());
        assert!(!Platform::Windows.needs_windowed_flag());
        assert!(!Platform::Linux.needs_windowed_flag());
    }
}
