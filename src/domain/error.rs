// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("User denied execution of tool: {0}")]
    Denied(String),

    #[error("{service} error: {message}")]
    Collaborator { service: String, message: String },

    #[error("External API error: {provider} responded with {status}")]
    ApiCall { provider: String, status: u16 },

    #[error(
        "Tool response payload is too large ({size} characters). The maximum is {limit}. Please try a more specific tool call."
    )]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Planner error: {message}")]
    Planner { message: String, recoverable: bool },

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Stable tag surfaced to the planner next to the error message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Initialization(_) => "initialization",
            AppError::Validation { .. } => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Denied(_) => "denied",
            AppError::Collaborator { .. } | AppError::ApiCall { .. } => "collaborator",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::Planner { .. } => "planner",
            AppError::Timeout { .. } => "timeout",
            AppError::Fatal(_) => "fatal",
            AppError::Unknown(_) => "unknown",
        }
    }

    /// Planner failures that cannot be fixed by waiting for the next tick.
    pub fn is_unrecoverable_planner(&self) -> bool {
        matches!(
            self,
            AppError::Planner {
                recoverable: false,
                ..
            }
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Timeout {
                operation: err
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|| "http request".to_string()),
                after_ms: 0,
            };
        }
        match err.status() {
            Some(status) => AppError::ApiCall {
                provider: err
                    .url()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| "http".to_string()),
                status: status.as_u16(),
            },
            None => AppError::collaborator("http", err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::collaborator("json", err.to_string())
    }
}
