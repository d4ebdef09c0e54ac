//! Centralized error handling for the exporter
//!
//! # Error Categories
//!
//! - **Config Errors**: layered configuration extraction and validation
//! - **Ingest Errors**: malformed payloads and transport client failures
//! - **Web Errors**: listener binding, serving and template rendering
//!
//! # Usage
//!
//! ```rust
//! use pskreporter_exporter::errors::AppResult;
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for configuration Results
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for ingestion Results
pub type IngestResult<T> = Result<T, IngestError>;

/// Convenience type alias for Web Results
pub type WebResult<T> = Result<T, WebError>;
