// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ChannelId = u64;

/// A channel as reported by the node daemon. Read-only outside execute actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub chan_id: ChannelId,
    pub remote_pubkey: String,
    pub channel_point: String,
    pub capacity: u64,
    pub local_balance: u64,
    pub remote_balance: u64,
    /// Seconds since the channel was opened.
    pub lifetime_secs: u64,
    pub active: bool,
    #[serde(default)]
    pub peer_alias: Option<String>,
}

impl Channel {
    /// local / capacity, zero for a zero-capacity channel.
    pub fn balance_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.local_balance as f64 / self.capacity as f64
    }

    /// Outbound share of the spendable balances (local + remote), in percent.
    pub fn outbound_pct(&self) -> f64 {
        let total = self.local_balance.saturating_add(self.remote_balance);
        if total == 0 {
            return 0.0;
        }
        self.local_balance as f64 * 100.0 / total as f64
    }

    pub fn age_days(&self) -> u64 {
        self.lifetime_secs / crate::domain::constants::SECS_PER_DAY
    }

    /// Splits `funding_txid:output_index`.
    pub fn outpoint(&self) -> Option<(&str, u32)> {
        let (txid, index) = self.channel_point.split_once(':')?;
        Some((txid, index.parse().ok()?))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEvent {
    /// Unix seconds.
    pub timestamp: u64,
    pub chan_id_in: ChannelId,
    pub chan_id_out: ChannelId,
    pub amt_in_msat: u64,
    pub amt_out_msat: u64,
    pub fee_msat: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityTrend {
    Inbound,
    Outbound,
    Balanced,
    Stagnant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidityClassification {
    pub channel_id: ChannelId,
    pub peer_alias: String,
    pub remote_pubkey: String,
    pub balance_ratio: f64,
    pub liquidity_trend: LiquidityTrend,
    pub inbound_msat: u64,
    pub outbound_msat: u64,
    pub last_forward_at: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceOpportunity {
    pub outgoing_channel_id: ChannelId,
    pub incoming_channel_id: ChannelId,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_sat: u64,
    pub swap_fee_sat: u64,
    pub prepay_amt_sat: u64,
    pub htlc_sweep_fee_sat: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapState {
    Initiated,
    PreimageRevealed,
    HtlcPublished,
    Success,
    Failed,
    InvoiceSettled,
    #[serde(other)]
    Unknown,
}

impl SwapState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SwapState::Success | SwapState::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStatus {
    pub id: String,
    pub state: SwapState,
    pub amount_sat: u64,
    /// Unix nanoseconds.
    pub initiation_time_ns: u64,
    pub outgoing_chan_set: Vec<ChannelId>,
    #[serde(default)]
    pub loop_out: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutRequest {
    pub amount_sat: u64,
    pub outgoing_chan_set: Vec<ChannelId>,
    pub sweep_conf_target: u32,
    pub max_swap_fee_sat: u64,
    pub max_prepay_amt_sat: u64,
    pub max_swap_routing_fee_sat: u64,
    pub max_prepay_routing_fee_sat: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopOutResponse {
    pub id: String,
    pub htlc_address: String,
    #[serde(default)]
    pub server_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityRole {
    Source,
    Sink,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerCandidate {
    pub pub_key: String,
    pub alias: String,
    /// Connectivity score: channel count reported by the directory.
    pub connectivity: u64,
    pub capacity_sat: u64,
    pub average_fee_rate_ppm: Option<f64>,
    pub role: LiquidityRole,
    pub addresses: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub total_balance: u64,
    pub confirmed_balance: u64,
    pub unconfirmed_balance: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBalance {
    pub local_balance_sat: u64,
    pub remote_balance_sat: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub identity_pubkey: String,
    pub alias: String,
    pub num_active_channels: u32,
    pub num_pending_channels: u32,
    pub num_peers: u32,
    pub block_height: u32,
    pub synced_to_chain: bool,
    pub synced_to_graph: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub pub_key: String,
    pub address: String,
    pub inbound: bool,
    pub sat_sent: u64,
    pub sat_recv: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEdge {
    pub channel_id: ChannelId,
    pub node1_pub: String,
    pub node2_pub: String,
    pub capacity: u64,
}

impl ChannelEdge {
    /// Pubkey of the end that is not `own_pubkey`.
    pub fn counterparty(&self, own_pubkey: &str) -> &str {
        if self.node1_pub == own_pubkey {
            &self.node2_pub
        } else {
            &self.node1_pub
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFeePolicy {
    pub chan_id: ChannelId,
    pub channel_point: String,
    pub base_fee_msat: u64,
    pub fee_rate_ppm: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAllocation {
    pub node_pubkey: String,
    pub local_funding_amount_sat: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOpen {
    pub funding_txid: String,
    pub output_index: u32,
}

impl PendingOpen {
    pub fn channel_point(&self) -> String {
        format!("{}:{}", self.funding_txid, self.output_index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Base64 as returned by the daemon.
    pub r_hash: String,
    pub payment_addr: String,
}

/// Route returned by the daemon's route query; `raw` is passed back verbatim on send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueriedRoute {
    pub total_amt_msat: u64,
    pub total_fees_msat: u64,
    pub hop_count: usize,
    pub raw: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub status: String,
    pub failure: Option<String>,
}

/// Mempool fee estimates in sat/vB.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecommendations {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
    pub economy_fee: u64,
    pub minimum_fee: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopNode {
    pub pub_key: String,
    pub alias: String,
    pub channels: u64,
    pub capacity_sat: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFeeSummary {
    pub pub_key: String,
    pub alias: String,
    pub num_channels: u64,
    pub average_fee_rate_ppm: Option<f64>,
    pub min_fee_rate_ppm: Option<u64>,
    pub max_fee_rate_ppm: Option<u64>,
}

/// Raw scored-node directory payload (Lightning Cluster `btc_summary.json` shape).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeAvailabilitySnapshot {
    #[serde(default)]
    pub last_updated: Option<Value>,
    #[serde(default)]
    pub max_score: Option<Value>,
    #[serde(default)]
    pub num_scored: Option<Value>,
    #[serde(default)]
    pub num_stable: Option<Value>,
    #[serde(default)]
    pub num_unstable: Option<Value>,
    #[serde(default)]
    pub num_non_connectable: Option<Value>,
    #[serde(default)]
    pub scored: std::collections::HashMap<String, ScoredNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub total_capacity: Option<u64>,
    #[serde(default)]
    pub total_peers: Option<u64>,
    #[serde(default)]
    pub centrality: Option<f64>,
    #[serde(default)]
    pub addresses: Vec<Value>,
    #[serde(default)]
    pub stable_inbound_peers: Vec<String>,
    #[serde(default)]
    pub stable_outbound_peers: Vec<String>,
}
