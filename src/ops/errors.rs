//! Fatal bootstrap errors.
//!
//! Anything in this enum aborts the pipeline. Component-level problems are
//! not errors; they are recorded as outcomes and reported by the verifier.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error that aborts a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("elevated privileges required (effective uid is {euid})")]
    Permission { euid: u32 },

    #[error("package index refresh failed: {message}")]
    IndexRefresh { message: String },

    #[error("no versions matching `{pattern}` in output of `{query}`")]
    NoCandidates { query: String, pattern: String },

    #[error("bootstrap exceeded its time budget of {budget_secs}s")]
    Timeout { budget_secs: u64 },

    #[error("bootstrap interrupted by operator")]
    Interrupted,

    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    #[error("component `{component}` requires unknown component `{dependency}`")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    #[error("component dependencies form a cycle involving `{component}`")]
    DependencyCycle { component: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BootstrapError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BootstrapError::Permission { .. } => diag
                .with_context("installing packages and editing groups needs root")
                .with_suggestion(suggestions::RUN_AS_ROOT),
            BootstrapError::IndexRefresh { .. } => {
                diag.with_suggestion(suggestions::CHECK_APT_SOURCES)
            }
            BootstrapError::NoCandidates { .. } => diag
                .with_context("the package repository may not have been refreshed yet")
                .with_suggestion(suggestions::CHECK_APT_SOURCES),
            BootstrapError::Timeout { .. } => diag
                .with_context("components finished so far were left fully processed")
                .with_suggestion(suggestions::RAISE_TIMEOUT),
            BootstrapError::Interrupted => diag
                .with_context("components finished so far were left fully processed")
                .with_suggestion(suggestions::RERUN),
            BootstrapError::UnknownComponent(_)
            | BootstrapError::UnknownDependency { .. }
            | BootstrapError::DependencyCycle { .. } => {
                diag.with_suggestion(suggestions::CHECK_COMPONENTS)
            }
            BootstrapError::Other(e) => {
                let mut diag = Diagnostic::error(e.to_string());
                for cause in e.chain().skip(1) {
                    diag = diag.with_context(cause.to_string());
                }
                diag
            }
        }
    }
}
