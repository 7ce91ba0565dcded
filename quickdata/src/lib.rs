//! # quickdata - in-memory analytics for conversational clients
//!
//! quickdata loads CSV and JSON files into Arrow tables, infers a semantic
//! role for every column and exposes a set of analyses over the loaded data:
//! distributions, correlations, segmentation, outliers, time series, data
//! quality, dataset comparison and merging. Charts and insight reports are
//! written as standalone files, and markdown prompts guide a user through
//! typical workflows. The [`server`] module serves all of it over the Model
//! Context Protocol.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quickdata::prelude::*;
//! use quickdata::tools;
//!
//! # async fn example() -> quickdata::error::Result<()> {
//! let registry = DatasetRegistry::new();
//! registry.load("data/sales.csv", "sales").await?;
//!
//! let schema = registry.schema("sales").await?;
//! for column in &schema.columns {
//!     println!("{}: {}", column.name, column.suggested_role);
//! }
//!
//! match tools::segment_by_column(&registry, "sales", "region", None, None).await {
//!     Outcome::Ok(report) => println!("{} segments", report.segment_count),
//!     Outcome::Error(message) => eprintln!("{message}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Registry lookups and ingest return [`error::Result`]. Analysis tools,
//! chart rendering and exports return [`outcome::Outcome`], which carries a
//! readable message instead of aborting the caller. Prompts always return a
//! string.

pub mod config;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod prelude;
pub mod prompts;
pub mod registry;
pub mod render;
pub mod resources;
pub mod schema;
pub mod security;
pub mod server;
pub mod sources;
pub mod stats;
pub mod table;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_fixtures;
