// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::ConfirmationMode;
use crate::common::parsing::parse_boolish;
use crate::services::agent::control::LineSource;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

/// Gate in front of sensitive actions. Only `true` lets an action run.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, action: &str, args: &Map<String, Value>) -> bool;
}

/// Prompts on stdout and reads the answer from the operator line source.
pub struct ConsoleConfirmer {
    lines: LineSource,
}

impl ConsoleConfirmer {
    pub fn new(lines: LineSource) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, action: &str, args: &Map<String, Value>) -> bool {
        let prompt = format!(
            "\nArguments: {}\nDo you want to execute the tool '{action}'? (yes/no): ",
            Value::Object(args.clone())
        );
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }
        let answer = self.lines.lock().await.recv().await;
        let approved = answer.as_deref().and_then(parse_boolish).unwrap_or(false);
        tracing::info!(target: "agent", action, approved, "confirmation answered");
        approved
    }
}

pub struct AutoApprove;

#[async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, action: &str, _args: &Map<String, Value>) -> bool {
        tracing::info!(target: "agent", action, "auto-approved");
        true
    }
}

pub struct AutoDeny;

#[async_trait]
impl Confirmer for AutoDeny {
    async fn confirm(&self, action: &str, _args: &Map<String, Value>) -> bool {
        tracing::info!(target: "agent", action, "auto-denied");
        false
    }
}

pub fn confirmer_for(mode: ConfirmationMode, lines: LineSource) -> Box<dyn Confirmer> {
    match mode {
        ConfirmationMode::Console => Box::new(ConsoleConfirmer::new(lines)),
        ConfirmationMode::AutoApprove => Box::new(AutoApprove),
        ConfirmationMode::AutoDeny => Box::new(AutoDeny),
    }
}
