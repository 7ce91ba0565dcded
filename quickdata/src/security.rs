//! Security utilities: credential handling, SQL identifier quoting and the
//! checks applied to code fragments before they reach the sandbox.

use crate::error::{AnalyticsError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

const MAX_IDENTIFIER_LENGTH: usize = 1024;

/// SQL identifier quoting for queries run against registered tables.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Quotes a column or table name for DataFusion SQL.
    ///
    /// Column names come from user files, so anything printable is accepted;
    /// the name is wrapped in double quotes with internal quotes doubled.
    ///
    /// ```rust
    /// use quickdata::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("Sales Amount").unwrap(), "\"Sales Amount\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::quote_identifier("bad\0name").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(AnalyticsError::SecurityError(
                "SQL identifier cannot be empty".to_string(),
            ));
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(AnalyticsError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }
        if identifier.chars().any(|c| c == '\0' || (c.is_control() && c != '\t')) {
            return Err(AnalyticsError::SecurityError(
                "SQL identifier cannot contain control characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks applied to code fragments handed to the custom code sandbox.
pub struct CodeSecurity;

impl CodeSecurity {
    /// Rejects fragments that are empty, oversized, or contain NUL bytes.
    ///
    /// The fragment itself is opaque: isolation is provided by the sandbox
    /// (cleared environment, private working directory, timeout), not by
    /// inspecting the code.
    pub fn validate_fragment(code: &str, max_length: usize) -> Result<()> {
        if code.trim().is_empty() {
            return Err(AnalyticsError::SecurityError(
                "Code fragment cannot be empty".to_string(),
            ));
        }
        if code.len() > max_length {
            return Err(AnalyticsError::SecurityError(format!(
                "Code fragment too long (max {max_length} bytes)"
            )));
        }
        if code.contains('\0') {
            return Err(AnalyticsError::SecurityError(
                "Code fragment cannot contain null bytes".to_string(),
            ));
        }
        Ok(())
    }
}
