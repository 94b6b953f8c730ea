use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownProvider(String),
    UnknownService(String),
    InvalidServiceName(String),
    InvalidRateLimit(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownProvider(code) => {
                write!(f, "unknown provider: {code}")
            }
            ModelError::UnknownService(name) => {
                write!(f, "service not offered by provider: {name}")
            }
            ModelError::InvalidServiceName(name) => {
                write!(f, "invalid service name: {name:?}")
            }
            ModelError::InvalidRateLimit(msg) => {
                write!(f, "invalid rate limit: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
