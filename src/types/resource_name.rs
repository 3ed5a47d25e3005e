// ABOUTME: DNS-compatible resource name validation.
// ABOUTME: Ensures workload names follow RFC 1123 subdomain requirements.

use std::fmt;
use thiserror::Error;

/// Longest name the API server accepts for controllers.
const MAX_LEN: usize = 253;

#[derive(Debug, Error)]
pub enum ResourceNameError {
    #[error("resource name cannot be empty")]
    Empty,

    #[error("resource name exceeds maximum length of 253 characters")]
    TooLong,

    #[error("resource name must start and end with an alphanumeric character")]
    BadBoundary,

    #[error("resource name must be lowercase")]
    NotLowercase,

    #[error("invalid character in resource name: '{0}'")]
    InvalidChar(char),
}

/// Name of a tracked workload, unique within its kind and namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(value: &str) -> Result<Self, ResourceNameError> {
        if value.is_empty() {
            return Err(ResourceNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(ResourceNameError::TooLong);
        }

        let boundary_ok = |c: Option<char>| {
            c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        };
        if !boundary_ok(value.chars().next()) || !boundary_ok(value.chars().last()) {
            if value.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(ResourceNameError::NotLowercase);
            }
            return Err(ResourceNameError::BadBoundary);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ResourceNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(ResourceNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
