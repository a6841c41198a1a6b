//! CLI error handling

use std::fmt;

use plugfetch_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(plugfetch_errors::Error),
    /// The install attempt failed
    Install(plugfetch_errors::Error),
    /// The install attempt was cancelled
    Cancelled,
}

impl CliError {
    /// Process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Cancelled => 130,
            CliError::Config(_) => 2,
            CliError::Install(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Install(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this install.")?;
                }
                Ok(())
            }
            CliError::Cancelled => write!(f, "Install cancelled"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) | CliError::Install(e) => Some(e),
            CliError::Cancelled => None,
        }
    }
}

impl From<plugfetch_errors::Error> for CliError {
    fn from(e: plugfetch_errors::Error) -> Self {
        CliError::Config(e)
    }
}
