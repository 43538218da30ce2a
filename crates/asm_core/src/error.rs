//! Error types for the core library

use std::fmt;

/// The core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Component key is not of the form `namespace:view`
    InvalidKey(Box<str>),
    /// Unknown hydration directive name
    InvalidDirective(Box<str>),
    /// The `media` directive was given without a query
    MissingMediaQuery,
    /// Hydration id is not of the form `h<n>`
    InvalidHydrationId(Box<str>),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidKey(key) => {
                write!(f, "Invalid component key '{}': expected namespace:view", key)
            }
            CoreError::InvalidDirective(name) => write!(f, "Unknown hydration directive: {}", name),
            CoreError::MissingMediaQuery => write!(f, "The media directive requires a query"),
            CoreError::InvalidHydrationId(id) => write!(f, "Invalid hydration id: {}", id),
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
