use thiserror::Error;

/// Errors produced while preparing diagrams for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("unknown theme '{0}' (expected 'light' or 'dark')")]
    UnknownTheme(String),
}
