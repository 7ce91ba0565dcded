//! Soft-failure result type shared by tools, charts and registry clears.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::AnalyticsError;

/// The result of a tool-style operation.
///
/// `Ok` serializes as the payload itself; `Error` serializes as
/// `{"error": "<message>"}`. The call succeeds at the protocol level either way.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Error(String),
}

impl<T> Outcome<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Converts a hard result into an outcome.
    ///
    /// Request validation errors keep their message; anything else is
    /// prefixed with `context` (for example `"Segmentation failed"`).
    pub fn from_result(result: crate::error::Result<T>, context: &str) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(err) => Self::Error(describe_failure(&err, context)),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn into_ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Error(message) => Some(message),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(value) => Outcome::Ok(f(value)),
            Self::Error(message) => Outcome::Error(message),
        }
    }
}

fn describe_failure(err: &AnalyticsError, context: &str) -> String {
    if err.is_user_facing() || context.is_empty() {
        err.to_string()
    } else {
        format!("{context}: {err}")
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Ok(value) => value.serialize(serializer),
            Self::Error(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}
