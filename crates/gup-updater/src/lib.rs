//! Gazetteer index updater
//!
//! Batch tool that refreshes the indices of a gazetteer-web instance: for
//! every configured region it downloads a fresh data dump, asks the remote
//! service to import it, and waits for the service to report completion
//! through an HTTP callback before cleaning the dump up. An embedded
//! listener receives those callbacks for the lifetime of the batch.
//!
//! # Example
//!
//! ```no_run
//! use gup_updater::{UpdateConfig, Updater};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = UpdateConfig::load(Path::new("update.yml"))?;
//!     let report = Updater::new(config).run().await?;
//!     tracing::info!("{} tasks processed", report.total());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod listener;
pub mod pidfile;
pub mod signal;
pub mod submit;
pub mod timestamps;
pub mod updater;

// Re-export commonly used types
pub use config::{ApiConfig, Task, UpdateConfig};
pub use error::{Result, UpdateError};
pub use updater::{BatchReport, Updater};
