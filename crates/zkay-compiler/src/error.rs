//! Compiler error types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source location of a diagnostic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub line: u32,
    pub column: u32,
    pub function: Option<String>,
    pub contract: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)?;
        match (&self.function, &self.contract) {
            (Some(func), Some(contract)) => {
                write!(f, ", in function '{}' of contract '{}'", func, contract)
            }
            (None, Some(contract)) => write!(f, ", in contract '{}'", contract),
            (Some(func), None) => write!(f, ", in function '{}'", func),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("Name resolution error: {message} ({context})")]
    NameResolution { message: String, context: ErrorContext },

    #[error("Type mismatch: expected {expected}, got {actual} ({context})")]
    TypeMismatch { expected: String, actual: String, context: ErrorContext },

    #[error("Type error: {message} ({context})")]
    Type { message: String, context: ErrorContext },

    #[error("Circuit compliance error: {message} ({context})")]
    CircuitCompliance { message: String, context: ErrorContext },

    #[error("Unsupported construct: {message} ({context})")]
    Unsupported { message: String, context: ErrorContext },

    #[error("Internal invariant violated: {0}")]
    Internal(String),

    #[error("Invalid AST JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Runtime(#[from] zkay_runtime::ZkayError),
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn name_resolution(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NameResolution { message: message.into(), context }
    }

    pub fn type_mismatch(
        expected: impl fmt::Display,
        actual: impl fmt::Display,
        context: ErrorContext,
    ) -> Self {
        Self::TypeMismatch { expected: expected.to_string(), actual: actual.to_string(), context }
    }

    pub fn type_error(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Type { message: message.into(), context }
    }

    pub fn compliance(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::CircuitCompliance { message: message.into(), context }
    }

    pub fn unsupported(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Unsupported { message: message.into(), context }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::NameResolution { context, .. }
            | Self::TypeMismatch { context, .. }
            | Self::Type { context, .. }
            | Self::CircuitCompliance { context, .. }
            | Self::Unsupported { context, .. } => Some(context),
            Self::Internal(_) | Self::Json(_) | Self::Runtime(_) => None,
        }
    }

    /// Formats the error with its location and, if `source` is given, a caret-marked excerpt
    ///
    /// # Examples
    ///
    /// ```
    /// use zkay_compiler::{CompilerError, ErrorContext};
    ///
    /// let ctx = ErrorContext {
    ///     line: 2,
    ///     column: 5,
    ///     function: Some("f".to_string()),
    ///     contract: Some("C".to_string()),
    /// };
    /// let err = CompilerError::type_error("Redundant reveal", ctx);
    /// let text = err.render(Some("contract C {\n    x = reveal(y, all);\n}"));
    /// assert!(text.contains("2:5, in function 'f' of contract 'C'"));
    /// assert!(text.contains("    ^"));
    /// ```
    pub fn render(&self, source: Option<&str>) -> String {
        let Some(ctx) = self.context() else {
            return self.to_string();
        };
        let headline = match self {
            Self::NameResolution { message, .. } => format!("Name resolution error: {}", message),
            Self::TypeMismatch { expected, actual, .. } => {
                format!("Type mismatch: expected {}, got {}", expected, actual)
            }
            Self::Type { message, .. } => format!("Type error: {}", message),
            Self::CircuitCompliance { message, .. } => {
                format!("Circuit compliance error: {}", message)
            }
            Self::Unsupported { message, .. } => format!("Unsupported construct: {}", message),
            _ => self.to_string(),
        };
        let mut out = format!("{}\n{}", headline, ctx);
        if let Some(line) = source.and_then(|s| s.lines().nth(ctx.line.saturating_sub(1) as usize)) {
            let col = ctx.column.saturating_sub(1) as usize;
            out.push('\n');
            out.push_str(line);
            out.push('\n');
            out.push_str(&" ".repeat(col.min(line.len())));
            out.push('^');
        }
        out
    }
}
