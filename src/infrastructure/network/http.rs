// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use reqwest::{Certificate, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Header carrying the hex macaroon on the daemon REST proxies.
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

const ERROR_BODY_PREVIEW: usize = 300;

pub fn build_client(tls_cert_path: Option<&str>, timeout: Duration) -> Result<Client, AppError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(path) = tls_cert_path.map(str::trim).filter(|p| !p.is_empty()) {
        let pem = std::fs::read(path).map_err(|e| {
            AppError::Initialization(format!("failed to read TLS certificate {path}: {e}"))
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            AppError::Initialization(format!("invalid TLS certificate {path}: {e}"))
        })?;
        builder = builder.add_root_certificate(cert);
    }
    builder
        .build()
        .map_err(|e| AppError::Initialization(format!("http client: {e}")))
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Decodes a JSON body, turning non-2xx statuses into collaborator errors that
/// keep the daemon's own message.
pub async fn decode_json<T: DeserializeOwned>(service: &str, resp: Response) -> Result<T, AppError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| AppError::collaborator(service, e.to_string()))?;
    if !status.is_success() {
        return Err(AppError::collaborator(
            service,
            format!("status {}: {}", status.as_u16(), error_message(&body)),
        ));
    }
    serde_json::from_str(&body).map_err(|e| {
        AppError::collaborator(service, format!("unexpected response shape: {e}"))
    })
}

/// Daemon REST errors look like `{"code":2,"message":"..."}` or `{"error": "..."}`.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key) {
                if let Some(s) = msg.as_str() {
                    return s.to_string();
                }
                if let Some(s) = msg.get("message").and_then(Value::as_str) {
                    return s.to_string();
                }
            }
        }
    }
    crate::common::parsing::preview(body.trim(), ERROR_BODY_PREVIEW)
}
