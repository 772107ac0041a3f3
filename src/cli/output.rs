//! User-facing terminal output.
//!
//! Progress and results go to stdout, warnings and errors to stderr. Prefixes
//! are colored when the stream is a terminal (and `NO_COLOR` is unset).
//! Diagnostic detail goes through `log` instead.

use std::io::{self, IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Prints status lines with a consistent prefix per message kind.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    stdout_color: ColorChoice,
    stderr_color: ColorChoice,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            stdout_color: color_choice(io::stdout().is_terminal()),
            stderr_color: color_choice(io::stderr().is_terminal()),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Only printed in verbose mode.
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.out(None, &format!("  {message}"));
        }
    }

    pub fn progress(&self, message: &str) {
        if !self.quiet {
            self.out(Some(("→", Color::Cyan)), message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.out(Some(("✓", Color::Green)), message);
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.err(Some(("⚠ Warning:", Color::Yellow)), message);
        }
    }

    /// Always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        self.err(Some(("✗ Error:", Color::Red)), message);
    }

    pub fn section(&self, title: &str) {
        if !self.quiet {
            let mut stdout = StandardStream::stdout(self.stdout_color);
            let _ = write_section(&mut stdout, title);
        }
    }

    /// Indented passthrough, used for subprocess output.
    pub fn indent(&self, message: &str) {
        if !self.quiet {
            self.out(None, &format!("    {message}"));
        }
    }

    fn out(&self, prefix: Option<(&str, Color)>, message: &str) {
        let mut stdout = StandardStream::stdout(self.stdout_color);
        let _ = write_line(&mut stdout, prefix, message);
    }

    fn err(&self, prefix: Option<(&str, Color)>, message: &str) {
        let mut stderr = StandardStream::stderr(self.stderr_color);
        let _ = write_line(&mut stderr, prefix, message);
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// Piped or redirected output never gets escape codes.
fn color_choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn write_line<W: WriteColor>(
    writer: &mut W,
    prefix: Option<(&str, Color)>,
    message: &str,
) -> io::Result<()> {
    if let Some((prefix, color)) = prefix {
        writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(writer, "{prefix}")?;
        writer.reset()?;
        write!(writer, " ")?;
    }
    writeln!(writer, "{message}")
}

fn write_section<W: WriteColor>(writer: &mut W, title: &str) -> io::Result<()> {
    writeln!(writer)?;
    writer.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(writer, "{title}")?;
    writer.reset()?;
    writeln!(writer, "{}", "─".repeat(title.chars().count().max(8)))
}
