//! Colored terminal output.

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Consistent colored output for operator-facing messages
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Create an output manager writing to stdout
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn emit(&self, marker: &str, marker_spec: &ColorSpec, text_spec: Option<&ColorSpec>, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.stdout.buffer();
        write_marked(&mut buffer, marker, marker_spec, text_spec, message);
        if let Err(e) = self.stdout.print(&buffer) {
            log::debug!("stdout write failed: {e}");
        }
    }

    /// Informational message
    pub fn info(&self, message: &str) {
        self.emit("ℹ", &fg(Color::Cyan), None, message);
    }

    /// Successful outcome
    pub fn success(&self, message: &str) {
        self.emit("✓", fg(Color::Green).set_bold(true), None, message);
    }

    /// Non-fatal problem
    pub fn warn(&self, message: &str) {
        self.emit("⚠", fg(Color::Yellow).set_bold(true), Some(&fg(Color::Yellow)), message);
    }

    /// Waiting on something external
    pub fn progress(&self, message: &str) {
        self.emit("⋯", &fg(Color::Magenta), None, message);
    }

    /// Debug detail, shown with `--verbose` only
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.emit("→", &fg(Color::Blue), None, message);
        }
    }

    /// Error message on stderr; shown even when quiet
    pub fn error(&self, message: &str) {
        let stderr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = stderr.buffer();
        write_marked(&mut buffer, "✗", fg(Color::Red).set_bold(true), Some(&fg(Color::Red)), message);
        if stderr.print(&buffer).is_err() {
            println!("✗ {message}");
        }
    }

    /// Section header
    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.stdout.buffer();
        let _ = writeln!(&mut buffer);
        let _ = buffer.set_color(fg(Color::Cyan).set_bold(true));
        let _ = writeln!(&mut buffer, "═══ {title} ═══");
        let _ = buffer.reset();
        let _ = self.stdout.print(&buffer);
    }

    /// Indented text below a previous line
    pub fn indent(&self, message: &str) {
        for line in message.lines() {
            self.println(&format!("    {line}"));
        }
    }

    /// Plain text
    pub fn println(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut buffer = self.stdout.buffer();
        let _ = writeln!(&mut buffer, "{message}");
        let _ = self.stdout.print(&buffer);
    }
}

fn fg(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

fn write_marked(buffer: &mut Buffer, marker: &str, marker_spec: &ColorSpec, text_spec: Option<&ColorSpec>, message: &str) {
    let _ = buffer.set_color(marker_spec);
    let _ = write!(buffer, "{marker}");
    let _ = buffer.reset();
    if let Some(spec) = text_spec {
        let _ = buffer.set_color(spec);
    }
    let _ = writeln!(buffer, " {message}");
    let _ = buffer.reset();
}
