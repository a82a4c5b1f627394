//! # sheetlog-core
//!
//! Core library for sheetlog - a spreadsheet interaction logger.
//!
//! This library provides:
//! - Domain types for ranges, sheets and workbooks as the host reports them
//! - The host integration seam (`Host`, `HostNotification`)
//! - Event capture, batching and delivery with connectivity monitoring
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheetlog_core::delivery::{DeliveryClient, HttpTransport};
//! use sheetlog_core::{Config, Host};
//!
//! async fn run<H: Host + 'static>(host: H) -> sheetlog_core::Result<()> {
//!     let config = Config::load()?;
//!     let transport = HttpTransport::new(&config.delivery)?;
//!
//!     // must run inside a tokio LocalSet
//!     let client = DeliveryClient::new(config.delivery, transport, host)?;
//!     client.start();
//!     Ok(())
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, DeliveryConfig};
pub use error::{Error, Result};
pub use host::{Host, HostNotification, NotificationSource};
pub use types::*;

// Public modules
pub mod config;
pub mod delivery;
pub mod error;
pub mod host;
pub mod logging;
pub mod types;
