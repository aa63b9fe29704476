//! Migrate a Piwigo photo gallery into a digiKam collection.
//!
//! The pipeline has three parts:
//! - [`piwigo`]: web-service client (login, paginated listings, downloads)
//! - [`digikam`]: collection writer (catalog schema, albums, tags, files)
//! - [`transfer`]: orchestration, progress reporting and failure bookkeeping

pub mod config;
pub mod digikam;
pub mod error;
pub mod logging;
pub mod piwigo;
pub mod transfer;

pub use error::{Error, Result};
