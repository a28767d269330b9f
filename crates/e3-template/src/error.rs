//! Error types for template checking and rendering

use thiserror::Error;

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while checking or rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Invalid template syntax
    #[error("invalid template syntax: {message}")]
    SyntaxError { message: String },

    /// Failed to render template
    #[error("failed to render template: {message}")]
    RenderError { message: String },

    /// Undefined variable in template
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },

    /// Rendered command payload is not a valid write envelope
    #[error("invalid command envelope: {message}")]
    InvalidEnvelope { message: String },
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => TemplateError::SyntaxError {
                message: err.to_string(),
            },
            minijinja::ErrorKind::UndefinedError => TemplateError::UndefinedVariable {
                name: err.to_string(),
            },
            _ => TemplateError::RenderError {
                message: err.to_string(),
            },
        }
    }
}
