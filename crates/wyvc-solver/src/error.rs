use std::fmt;

/// Errors from checker interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The backend failed to start or crashed mid-query.
    Backend(String),
    /// The backend produced output the adapter could not interpret.
    Protocol(String),
    /// The configured time budget was exceeded.
    Timeout,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Backend(msg) => write!(f, "solver backend error: {msg}"),
            SolverError::Protocol(msg) => write!(f, "malformed solver response: {msg}"),
            SolverError::Timeout => write!(f, "solver timeout exceeded"),
        }
    }
}

impl std::error::Error for SolverError {}
