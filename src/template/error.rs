// ABOUTME: Error types for template engine operations
// ABOUTME: Separates render-aborting failures from the errors raised inside template functions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template render error: {0}")]
    RenderError(String),

    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl From<handlebars::RenderError> for TemplateError {
    fn from(err: handlebars::RenderError) -> Self {
        TemplateError::RenderError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for TemplateError {
    fn from(err: handlebars::TemplateError) -> Self {
        TemplateError::SyntaxError(err.to_string())
    }
}

/// Failures raised by a template function. Every variant aborts the render.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("expected {expected} argument(s), got {actual}")]
    ArgumentCount { expected: String, actual: usize },

    #[error("invalid argument {index}: {message}")]
    InvalidArgument { index: usize, message: String },

    #[error("cannot choose from an empty candidate list")]
    EmptyChoice,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FunctionError {
    pub fn invalid(index: usize, message: impl Into<String>) -> Self {
        FunctionError::InvalidArgument {
            index,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("failed to parse PEM block containing the public key: {0}")]
    PemParse(String),

    #[error("failed to parse DER encoded public key: {0}")]
    DerParse(String),

    #[error("key type is not RSA")]
    NotRsa,

    #[error("failed to encrypt with RSA public key: {0}")]
    Encrypt(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("no secret server")]
    NoSecretServer,

    #[error("secret not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("failed to write snippet: {0}")]
    Write(#[from] std::io::Error),

    #[error("output buffer lock poisoned")]
    Poisoned,

    #[error("invalid step pattern for {name}: {message}")]
    Pattern { name: String, message: String },
}

/// Outcome of a function whose failure is rendered in place of its value
/// instead of aborting the render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineText {
    Value(String),
    Fallback(String),
}

impl InlineText {
    pub fn is_fallback(&self) -> bool {
        matches!(self, InlineText::Fallback(_))
    }

    pub fn into_text(self) -> String {
        match self {
            InlineText::Value(text) | InlineText::Fallback(text) => text,
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
