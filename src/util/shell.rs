//! Centralized console output.
//!
//! Every user-facing line goes through [`Shell`], which provides:
//! - Level-tagged lines (`INFO`, `SUCCESS`, `WARNING`, `ERROR`)
//! - Scoped timing spans for individual bootstrap steps
//! - JSON output mode for machine-readable output
//! - A capture mode so tests can assert on what was printed
//!
//! # Design Principles
//!
//! 1. **Steps never print directly** - Shell handles tags, colors and streams
//! 2. **ERROR goes to stderr** - every other level goes to stdout
//! 3. **JSON mode is mutually exclusive** - No human output when JSON mode is enabled

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shell output mode - Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Machine-readable JSON output only.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only
    Quiet,
    /// Default: every level
    #[default]
    Normal,
    /// --verbose: every level plus step details
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Severity tag carried by every console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    /// Get the tag text for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    /// Get the ANSI color code for this level.
    fn color_code(&self) -> &'static str {
        match self {
            Level::Info => "\x1b[1;34m",
            Level::Success => "\x1b[1;32m",
            Level::Warning => "\x1b[1;33m",
            Level::Error => "\x1b[1;31m",
        }
    }

    /// Width of the widest tag, used for right alignment.
    fn width(&self) -> usize {
        7
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
    /// JSON output buffer for machine-readable mode
    json_output: Mutex<Vec<String>>,
    /// Captured lines instead of writing to the terminal
    capture: Option<Mutex<Vec<(Level, String)>>>,
    /// Whether we've printed anything (for newline management)
    has_output: AtomicBool,
}

impl Shell {
    /// Create a new shell with the given mode.
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stdout().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell {
            mode,
            use_color,
            json_output: Mutex::new(Vec::new()),
            capture: None,
            has_output: AtomicBool::new(false),
        }
    }

    /// Create a shell that records lines in memory instead of printing them.
    pub fn capturing(verbosity: Verbosity) -> Self {
        let mut shell = Shell::new(ShellMode::Human {
            verbosity,
            color: ColorChoice::Never,
        });
        shell.capture = Some(Mutex::new(Vec::new()));
        shell
    }

    /// Create a shell from CLI flags with proper precedence.
    ///
    /// JSON mode takes precedence over quiet/verbose.
    pub fn from_flags(
        quiet: bool,
        verbose: bool,
        color: ColorChoice,
        message_format_json: bool,
    ) -> Self {
        let mode = if message_format_json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    /// Get the current shell mode.
    pub fn mode(&self) -> &ShellMode {
        &self.mode
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    /// Check if shell is in JSON mode.
    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Check if colors are enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Whether any line has been emitted yet.
    pub fn has_output(&self) -> bool {
        self.has_output.load(Ordering::SeqCst)
    }

    /// Print a line tagged with `level`.
    ///
    /// Format: `{level:>7} {message}`
    ///
    /// In quiet mode, only Error lines are printed.
    /// In JSON mode, messages are silently ignored (use json_event for JSON output).
    pub fn print(&self, level: Level, msg: impl Display) {
        if self.is_json() {
            return;
        }

        if self.is_quiet() && level != Level::Error {
            return;
        }

        let msg = msg.to_string();
        self.has_output.store(true, Ordering::SeqCst);

        if let Some(capture) = &self.capture {
            if let Ok(mut lines) = capture.lock() {
                lines.push((level, msg));
            }
            return;
        }

        let prefix = self.format_level(level);
        if level == Level::Error {
            eprintln!("{} {}", prefix, msg);
        } else {
            println!("{} {}", prefix, msg);
        }
    }

    /// Print an info line.
    pub fn info(&self, msg: impl Display) {
        self.print(Level::Info, msg);
    }

    /// Print a success line.
    pub fn success(&self, msg: impl Display) {
        self.print(Level::Success, msg);
    }

    /// Print a warning line.
    pub fn warn(&self, msg: impl Display) {
        self.print(Level::Warning, msg);
    }

    /// Print an info line only in verbose mode.
    pub fn detail(&self, msg: impl Display) {
        if self.is_verbose() {
            self.print(Level::Info, msg);
        }
    }

    /// Print an error line.
    ///
    /// In JSON mode, this outputs a JSON error event.
    pub fn error(&self, msg: impl Display) {
        if self.is_json() {
            let event = serde_json::json!({
                "reason": "error",
                "message": msg.to_string()
            });
            self.json_event(&event);
        } else {
            self.print(Level::Error, msg);
        }
    }

    /// Print a JSON event to stdout.
    ///
    /// Only works in JSON mode; silently ignored in human mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.is_json() {
            return;
        }

        let json_str = serde_json::to_string(event).unwrap_or_default();
        if self.capture.is_none() {
            println!("{}", json_str);
            let _ = io::stdout().flush();
        }

        if let Ok(mut buffer) = self.json_output.lock() {
            buffer.push(json_str);
        }
    }

    /// JSON events emitted so far.
    pub fn json_events(&self) -> Vec<String> {
        self.json_output
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// Lines recorded by a capturing shell.
    pub fn captured(&self) -> Vec<(Level, String)> {
        self.capture
            .as_ref()
            .and_then(|c| c.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    /// Format a level prefix with optional color.
    fn format_level(&self, level: Level) -> String {
        let text = level.as_str();
        let width = level.width();

        if self.use_color {
            let color = level.color_code();
            format!("{}{:>width$}\x1b[0m", color, text, width = width)
        } else {
            format!("{:>width$}", text, width = width)
        }
    }

    /// Create a scoped span for timing one step.
    ///
    /// The start message is printed immediately as INFO. The span must be
    /// closed with [`Span::finish`]; a span dropped while still open reports
    /// the step as interrupted.
    pub fn span(self: &Arc<Self>, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A scoped timing span around one bootstrap step.
pub struct Span {
    shell: Arc<Shell>,
    message: String,
    start: Instant,
    finished: bool,
}

impl Span {
    fn new(shell: Arc<Shell>, message: String) -> Self {
        shell.info(&message);
        Span {
            shell,
            message,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Close the span, printing `msg` at `level` with the elapsed time.
    pub fn finish(mut self, level: Level, msg: impl Display) {
        self.finished = true;
        let elapsed = format_duration(self.start.elapsed());
        let line = format!("{} ({})", msg, elapsed);
        match level {
            Level::Error => self.shell.error(line),
            other => self.shell.print(other, line),
        }
    }

    /// Get elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        self.shell.warn(format!(
            "{} interrupted after {}",
            self.message,
            format_duration(self.start.elapsed())
        ));
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}
