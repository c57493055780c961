//! # renal-mri-trends
//!
//! Counts renal MRI publications on PubMed per technique and year, and plots
//! their cumulative growth.
//!
//! ## Modules
//!
//! - [`config`] - Survey configuration and defaults
//! - [`query`] - Search term builder
//! - [`entrez`] - NCBI esearch client
//! - [`aggregate`] - Deduplicated counts and cumulative series
//! - [`persist`] - JSON/CSV artifacts
//! - [`plot`] - SVG chart
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use renal_mri_trends::{aggregate, entrez::EntrezClient, persist, SurveyConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SurveyConfig::new("you@example.org");
//!     let client = EntrezClient::new(&config.email, config.policy.clone())?;
//!     let outcome = aggregate::run_survey(&client, &config).await?;
//!     persist::save_outcome(&config.output, &outcome)?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod entrez;
pub mod error;
pub mod persist;
pub mod plot;
pub mod query;

pub use config::{SurveyConfig, Technique};
pub use error::{Result, SurveyError};
