// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::EXIT_TOKENS;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Operator input lines, shared by the control channel and the console confirmer.
pub type LineSource = Arc<Mutex<mpsc::Receiver<String>>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Stop,
    Instruction(String),
}

pub fn line_source(rx: mpsc::Receiver<String>) -> LineSource {
    Arc::new(Mutex::new(rx))
}

/// Forwards stdin lines until EOF or cancellation.
pub fn spawn_stdin_reader(shutdown: CancellationToken) -> LineSource {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = lines.next_line() => next,
            };
            match next {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!(target: "agent", "stdin closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(target: "agent", error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    line_source(rx)
}

/// `None` means no input arrived in time.
pub fn interpret(line: Option<&str>, default_instruction: &str) -> ControlSignal {
    let Some(line) = line.map(str::trim).filter(|l| !l.is_empty()) else {
        return ControlSignal::Instruction(default_instruction.to_string());
    };
    if EXIT_TOKENS.iter().any(|t| line.eq_ignore_ascii_case(t)) {
        return ControlSignal::Stop;
    }
    ControlSignal::Instruction(line.to_string())
}

/// Waits up to `wait` for the next operator line.
pub async fn next_signal(
    lines: &LineSource,
    wait: Duration,
    default_instruction: &str,
    shutdown: &CancellationToken,
) -> ControlSignal {
    let deadline = tokio::time::Instant::now() + wait;
    let received = tokio::select! {
        _ = shutdown.cancelled() => return ControlSignal::Stop,
        received = tokio::time::timeout_at(deadline, async { lines.lock().await.recv().await }) => received,
    };
    match received {
        Ok(Some(line)) => interpret(Some(&line), default_instruction),
        Ok(None) => {
            // Input closed: only the interval drives further ticks.
            tokio::select! {
                _ = shutdown.cancelled() => return ControlSignal::Stop,
                _ = tokio::time::sleep_until(deadline) => {}
            }
            interpret(None, default_instruction)
        }
        Err(_) => interpret(None, default_instruction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_tokens_are_case_insensitive() {
        assert_eq!(interpret(Some("exit"), "d"), ControlSignal::Stop);
        assert_eq!(interpret(Some("  QUIT "), "d"), ControlSignal::Stop);
        assert_eq!(
            interpret(Some("exiting soon"), "d"),
            ControlSignal::Instruction("exiting soon".into())
        );
    }

    #[test]
    fn blank_and_missing_input_use_default() {
        assert_eq!(interpret(Some("   "), "d"), ControlSignal::Instruction("d".into()));
        assert_eq!(interpret(None, "d"), ControlSignal::Instruction("d".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_default_instruction() {
        let (_tx, rx) = mpsc::channel::<String>(1);
        let lines = line_source(rx);
        let signal = next_signal(&lines, Duration::from_secs(600), "assess", &CancellationToken::new()).await;
        assert_eq!(signal, ControlSignal::Instruction("assess".into()));
    }

    #[tokio::test]
    async fn queued_line_is_returned_and_cancel_stops() {
        let (tx, rx) = mpsc::channel::<String>(1);
        let lines = line_source(rx);
        tx.send("open channels".into()).await.unwrap();
        let shutdown = CancellationToken::new();
        let signal = next_signal(&lines, Duration::from_secs(5), "assess", &shutdown).await;
        assert_eq!(signal, ControlSignal::Instruction("open channels".into()));

        shutdown.cancel();
        let signal = next_signal(&lines, Duration::from_secs(5), "assess", &shutdown).await;
        assert_eq!(signal, ControlSignal::Stop);
    }
}
