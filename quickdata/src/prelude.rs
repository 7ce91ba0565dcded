//! Prelude for commonly used types in quickdata.

pub use crate::config::{AnalyticsConfig, OutputConfig, SandboxConfig, ServerConfig, ServerSettings};
pub use crate::error::{AnalyticsError, ErrorContext, Result};
pub use crate::logging::LogConfig;
pub use crate::outcome::Outcome;
pub use crate::registry::DatasetRegistry;
pub use crate::schema::{ColumnInfo, ColumnRole, DatasetSchema, SchemaInferencer};
pub use crate::server::McpServer;
pub use crate::table::Table;
