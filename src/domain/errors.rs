//! Error types for the formula engine.
//!
//! Two classes of failure are kept strictly apart: [`FormulaParseError`] is
//! raised while an expression is being built and aborts construction
//! entirely, while [`FormulaError`] is an ordinary evaluation result (an
//! undefined variable or a division by zero) that callers display as an
//! error marker rather than a number.

use thiserror::Error;

/// Rejection of malformed formula source text at construction time.
///
/// No partially-built expression ever escapes; the message names the
/// offending token or rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormulaParseError {
    message: String,
}

impl FormulaParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Value produced when a formula evaluates to something other than a number.
///
/// Evaluation never panics on user input; this is a legitimate return
/// value, cached in the owning cell like any number would be.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FormulaError {
    reason: String,
}

impl FormulaError {
    pub(crate) fn undefined_variable(name: &str) -> Self {
        Self {
            reason: format!("undefined variable {name}"),
        }
    }

    pub(crate) fn division_by_zero() -> Self {
        Self {
            reason: "division by zero".to_string(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors surfaced at the spreadsheet boundary.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("invalid cell name: {0}")]
    InvalidName(String),

    #[error("circular reference involving {0}")]
    CircularReference(String),

    #[error("malformed formula: {0}")]
    Formula(#[from] FormulaParseError),

    #[error("read/write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read/write error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SheetResult<T> = Result<T, SheetError>;
