// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Process-lifetime counters. Monotonic; never reset.
#[derive(Debug, Default)]
pub struct AgentStats {
    pub ticks: AtomicU64,
    pub ticks_abandoned: AtomicU64,
    pub planner_rounds: AtomicU64,
    pub actions_executed: AtomicU64,
    pub actions_failed: AtomicU64,
    pub actions_denied: AtomicU64,
    pub payload_rejections: AtomicU64,
    pub tokens_used: AtomicU64,
}

impl AgentStats {
    pub fn add_tokens(&self, tokens: u64) -> u64 {
        self.tokens_used.fetch_add(tokens, Ordering::Relaxed) + tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> [(&'static str, u64); 8] {
        [
            ("agent_ticks", self.ticks.load(Ordering::Relaxed)),
            (
                "agent_ticks_abandoned",
                self.ticks_abandoned.load(Ordering::Relaxed),
            ),
            (
                "agent_planner_rounds",
                self.planner_rounds.load(Ordering::Relaxed),
            ),
            (
                "agent_actions_executed",
                self.actions_executed.load(Ordering::Relaxed),
            ),
            (
                "agent_actions_failed",
                self.actions_failed.load(Ordering::Relaxed),
            ),
            (
                "agent_actions_denied",
                self.actions_denied.load(Ordering::Relaxed),
            ),
            (
                "agent_payload_rejections",
                self.payload_rejections.load(Ordering::Relaxed),
            ),
            ("agent_tokens_used", self.tokens_used.load(Ordering::Relaxed)),
        ]
    }
}

pub async fn spawn_metrics_server(
    bind: &str,
    port: u16,
    stats: Arc<AgentStats>,
    shutdown: CancellationToken,
) -> Option<SocketAddr> {
    let ip: IpAddr = bind.parse().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let addr = SocketAddr::new(ip, port);
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(target: "agent", "Metrics server failed to bind: {}", e);
            return None;
        }
    };

    let local = listener.local_addr().ok();
    if let Some(addr) = local {
        tracing::info!(target: "agent", "Metrics server listening on {}", addr);
    }

    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((mut socket, _)) => {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let req = String::from_utf8_lossy(&buf[..n]).to_string();
                    let route = req
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/");

                    let (content_type, body) = if route.starts_with("/stats") {
                        ("application/json", render_stats_json(&stats))
                    } else {
                        ("text/plain", render_metrics(&stats))
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        content_type,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
                Err(e) => {
                    tracing::warn!(target: "agent", "Metrics accept error: {}", e);
                    continue;
                }
            }
        }
    });

    local
}

fn render_metrics(stats: &AgentStats) -> String {
    stats
        .snapshot()
        .iter()
        .map(|(name, value)| format!("# TYPE {name} counter\n{name} {value}\n"))
        .collect()
}

fn render_stats_json(stats: &AgentStats) -> String {
    let map: serde_json::Map<String, serde_json::Value> = stats
        .snapshot()
        .iter()
        .map(|(name, value)| (name.to_string(), json!(value)))
        .collect();
    serde_json::Value::Object(map).to_string()
}
