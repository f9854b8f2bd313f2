// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::domain::types::{FeeRecommendations, NodeAvailabilitySnapshot, NodeFeeSummary, TopNode};
use crate::infrastructure::network::http::{build_client, decode_json, join_url};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const SERVICE: &str = "directory";
const RETRY_ATTEMPTS: usize = 3;
const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Read-only third-party lookups.
#[async_trait]
pub trait NetworkDirectory: Send + Sync {
    async fn fee_recommendations(&self) -> Result<FeeRecommendations, AppError>;
    /// Nodes ranked by connectivity, best first.
    async fn top_nodes(&self, limit: usize) -> Result<Vec<TopNode>, AppError>;
    async fn node_fee_summary(&self, pubkey: &str) -> Result<NodeFeeSummary, AppError>;
    async fn node_sockets(&self, pubkey: &str) -> Result<Vec<String>, AppError>;
    async fn node_availability(&self, url: &str) -> Result<NodeAvailabilitySnapshot, AppError>;
}

#[derive(Clone)]
pub struct MempoolDirectory {
    client: Client,
    base_url: String,
}

impl MempoolDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(None, timeout)?,
            base_url: base_url.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        retry_async(
            |_| async move {
                let resp = self.client.get(url).send().await?;
                decode_json::<T>(SERVICE, resp).await
            },
            RETRY_ATTEMPTS,
            RETRY_INITIAL_DELAY,
        )
        .await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankedNodeWire {
    public_key: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    channels: Option<u64>,
    #[serde(default)]
    capacity: Option<u64>,
}

#[derive(Deserialize)]
struct NodeChannelWire {
    #[serde(default)]
    fee_rate: Option<u64>,
}

#[derive(Deserialize)]
struct NodeWire {
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    sockets: Option<String>,
    #[serde(default)]
    active_channel_count: Option<u64>,
}

/// Mean/min/max of a node's outbound fee rates; `None` when it has no channels.
pub fn summarize_fee_rates(rates: &[u64]) -> (Option<f64>, Option<u64>, Option<u64>) {
    if rates.is_empty() {
        return (None, None, None);
    }
    let sum: u128 = rates.iter().map(|r| *r as u128).sum();
    let avg = sum as f64 / rates.len() as f64;
    (
        Some((avg * 100.0).round() / 100.0),
        rates.iter().copied().min(),
        rates.iter().copied().max(),
    )
}

pub fn split_sockets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl NetworkDirectory for MempoolDirectory {
    async fn fee_recommendations(&self) -> Result<FeeRecommendations, AppError> {
        self.get_json(&join_url(&self.base_url, "/v1/fees/recommended"))
            .await
    }

    async fn top_nodes(&self, limit: usize) -> Result<Vec<TopNode>, AppError> {
        let ranked: Vec<RankedNodeWire> = self
            .get_json(&join_url(
                &self.base_url,
                "/v1/lightning/nodes/rankings/connectivity",
            ))
            .await?;
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|n| TopNode {
                alias: n.alias.unwrap_or_default(),
                pub_key: n.public_key,
                channels: n.channels.unwrap_or(0),
                capacity_sat: n.capacity.unwrap_or(0),
            })
            .collect())
    }

    async fn node_fee_summary(&self, pubkey: &str) -> Result<NodeFeeSummary, AppError> {
        let channels: Vec<NodeChannelWire> = self
            .get_json(&join_url(
                &self.base_url,
                &format!("/v1/lightning/channels?public_key={pubkey}&status=open"),
            ))
            .await?;
        let node: NodeWire = self
            .get_json(&join_url(
                &self.base_url,
                &format!("/v1/lightning/nodes/{pubkey}"),
            ))
            .await?;
        let rates: Vec<u64> = channels.iter().filter_map(|c| c.fee_rate).collect();
        let (avg, min, max) = summarize_fee_rates(&rates);
        Ok(NodeFeeSummary {
            pub_key: pubkey.to_string(),
            alias: node.alias.unwrap_or_default(),
            num_channels: node
                .active_channel_count
                .unwrap_or(channels.len() as u64),
            average_fee_rate_ppm: avg,
            min_fee_rate_ppm: min,
            max_fee_rate_ppm: max,
        })
    }

    async fn node_sockets(&self, pubkey: &str) -> Result<Vec<String>, AppError> {
        let node: NodeWire = self
            .get_json(&join_url(
                &self.base_url,
                &format!("/v1/lightning/nodes/{pubkey}"),
            ))
            .await
            .map_err(|e| match e {
                AppError::Collaborator { message, .. } if message.starts_with("status 404") => {
                    AppError::NotFound(format!("Node {pubkey} not found in directory"))
                }
                other => other,
            })?;
        Ok(node.sockets.as_deref().map(split_sockets).unwrap_or_default())
    }

    async fn node_availability(&self, url: &str) -> Result<NodeAvailabilitySnapshot, AppError> {
        let snapshot: NodeAvailabilitySnapshot = self.get_json(url).await.map_err(|e| {
            AppError::collaborator(SERVICE, format!("Failed to fetch data from {url}: {e}"))
        })?;
        tracing::info!(
            target: "directory",
            nodes = snapshot.scored.len(),
            "node availability snapshot fetched"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_summary_handles_empty_and_mixed_rates() {
        assert_eq!(summarize_fee_rates(&[]), (None, None, None));
        let (avg, min, max) = summarize_fee_rates(&[10, 20, 31]);
        assert_eq!(avg, Some(20.33));
        assert_eq!(min, Some(10));
        assert_eq!(max, Some(31));
    }

    #[test]
    fn sockets_split_on_commas() {
        assert_eq!(
            split_sockets("1.2.3.4:9735, abc.onion:9735,"),
            vec!["1.2.3.4:9735".to_string(), "abc.onion:9735".to_string()]
        );
    }

    #[test]
    fn ranked_wire_uses_camel_case() {
        let nodes: Vec<RankedNodeWire> = serde_json::from_str(
            r#"[{"publicKey":"02aa","alias":"acinq","channels":3000,"capacity":1000}]"#,
        )
        .unwrap();
        assert_eq!(nodes[0].public_key, "02aa");
        assert_eq!(nodes[0].channels, Some(3000));
    }
}
