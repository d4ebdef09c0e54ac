//! Error type definitions for the exporter
//!
//! Each layer has its own error enum; `AppError` wraps them for the binary.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Metrics recorder could not be installed
    #[error("Metrics error: {message}")]
    Metrics { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Layered configuration could not be extracted
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value parsed but is not acceptable
    #[error("Invalid configuration: {field} - {message}")]
    Invalid { field: String, message: String },
}

/// Errors raised while turning a transport message into a spot
#[derive(Error, Debug)]
pub enum IngestError {
    /// Payload was not valid JSON for the spot schema
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// MQTT client request could not be queued
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Broker address is not `host:port`
    #[error("Invalid broker address: {address}")]
    BrokerAddress { address: String },
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server stopped with an I/O error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    /// Template rendering failed
    #[error("Render error: {0}")]
    Render(#[from] askama::Error),
}

impl AppError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a metrics error
    pub fn metrics<S: Into<String>>(message: S) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
