//! User-friendly diagnostic messages.
//!
//! Fatal errors are rendered with their root cause, the context that led to
//! them and the commands that usually fix them.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when not running as root.
    pub const RUN_AS_ROOT: &str = "Re-run with elevated privileges: `sudo hostprep bootstrap`";

    /// Suggestion when apt cannot refresh its index.
    pub const CHECK_APT_SOURCES: &str =
        "Check network access and the entries under /etc/apt/sources.list.d";

    /// Suggestion when the run exceeded its budget.
    pub const RAISE_TIMEOUT: &str =
        "Re-run with a larger budget, e.g. `hostprep bootstrap --timeout 1200`";

    /// Suggestion after an interrupt.
    pub const RERUN: &str = "Re-run `hostprep bootstrap`; completed components are skipped";

    /// Suggestion when the component graph is invalid.
    pub const CHECK_COMPONENTS: &str = "Run `hostprep plan` to inspect the component list";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic as plain lines (no level tag; the shell adds it).
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![self.message.clone()];

        if let Some(ref path) = self.location {
            out.push(format!("  --> {}", path.display()));
        }

        for ctx in &self.context {
            out.push(format!("  = {}", ctx));
        }

        if !self.suggestions.is_empty() {
            out.push("help: consider:".to_string());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                out.push(format!("  {}. {}", i + 1, suggestion));
            }
        }

        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.severity)?;
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
