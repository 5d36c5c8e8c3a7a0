//! Error Taxonomy
//!
//! Every user-visible failure maps onto one of these kinds, each with a
//! fixed default exit status. Messages print as single lines on stderr
//! prefixed with the shell name.

use thiserror::Error;

use crate::expand::ExpandError;
use crate::parser::ParseException;

#[derive(Debug, Clone, Error)]
pub enum ShellError {
    #[error("{0}")]
    Syntax(#[from] ParseException),

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{0}: permission denied")]
    PermissionDenied(String),

    #[error("{target}: {reason}")]
    Redirection { target: String, reason: String },

    #[error("{0}")]
    Expansion(ExpandError),

    #[error("{0}: readonly variable")]
    ReadonlyVariable(String),

    #[error("{0}")]
    JobControl(String),

    #[error("terminated by signal {0}")]
    SignalInterrupt(i32),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShellError {
    /// The `$?` value this error produces.
    pub fn status(&self) -> i32 {
        match self {
            ShellError::Syntax(_) => 2,
            ShellError::CommandNotFound(_) => 127,
            ShellError::PermissionDenied(_) => 126,
            ShellError::Redirection { .. } => 1,
            ShellError::Expansion(_) => 1,
            ShellError::ReadonlyVariable(_) => 1,
            ShellError::JobControl(_) => 1,
            ShellError::SignalInterrupt(sig) => 128 + sig,
            ShellError::Internal(_) => 1,
        }
    }

    /// Print the single-line diagnostic.
    pub fn report(&self) {
        eprintln!("den: {}", self);
    }
}

impl From<ExpandError> for ShellError {
    fn from(e: ExpandError) -> Self {
        match e {
            ExpandError::Readonly(name) => ShellError::ReadonlyVariable(name),
            other => ShellError::Expansion(other),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ShellError::CommandNotFound("x".into()).status(), 127);
        assert_eq!(ShellError::PermissionDenied("x".into()).status(), 126);
        assert_eq!(ShellError::SignalInterrupt(9).status(), 137);
        assert_eq!(ShellError::ReadonlyVariable("r".into()).status(), 1);
    }
}
