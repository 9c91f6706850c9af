//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DaemonConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    let timeouts = [
        ("listener.request_timeout", config.listener.request_timeout),
        ("lxd.liveness_timeout", config.lxd.liveness_timeout),
        ("lxd.api_timeout", config.lxd.api_timeout),
        ("lxd.command_timeout", config.lxd.command_timeout),
    ];
    for (field, value) in timeouts {
        if value.is_zero() {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.lxd.socket.is_empty() {
        errors.push(ValidationError::new("lxd.socket", "must not be empty"));
    }
    if config.lxd.binary.is_empty() {
        errors.push(ValidationError::new("lxd.binary", "must not be empty"));
    }
    if config.lxd.process_name.is_empty() {
        errors.push(ValidationError::new("lxd.process_name", "must not be empty"));
    }

    if !config.oom.interval.is_zero() {
        if config.oom.min_free == 0 {
            errors.push(ValidationError::new(
                "oom.min_free",
                "must be greater than zero when the sweep is enabled",
            ));
        }
        if config.oom.skip_key.is_empty() {
            errors.push(ValidationError::new("oom.skip_key", "must not be empty"));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("invalid socket address {addr:?}"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
