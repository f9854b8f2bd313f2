// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::{GlobalSettings, PolicySettings};
use crate::common::parsing::preview;
use crate::common::retry::with_timeout;
use crate::domain::conversation::{ActionRequest, ActionResult};
use crate::domain::error::AppError;
use crate::domain::types::{ChannelAllocation, ChannelId, LiquidityRole, NodeFeeSummary, PeerCandidate, TopNode};
use crate::infrastructure::network::{ChannelManager, NetworkDirectory, SwapService};
use crate::services::agent::catalog::ActionKind;
use crate::services::agent::confirm::Confirmer;
use crate::services::agent::schema::{coerce, parse_args};
use crate::services::graph::NodeGraphCache;
use crate::services::liquidity::openings::{self, OpenOperation, PremiumPeer};
use crate::services::liquidity::{FeeStrategy, analyzer, closures, fees, rebalance, swaps};
use crate::services::metrics::AgentStats;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct Collaborators {
    pub lnd: Arc<dyn ChannelManager>,
    pub swap: Arc<dyn SwapService>,
    pub directory: Arc<dyn NetworkDirectory>,
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub policy: PolicySettings,
    pub node_blacklist: Vec<String>,
    pub swap_counterparty: String,
    pub node_availability_url: String,
    pub collaborator_timeout: Duration,
    pub action_delay: Duration,
    pub max_payload_chars: usize,
    pub enrichment_concurrency: usize,
}

impl DispatchSettings {
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self {
            policy: settings.policy.clone(),
            node_blacklist: settings.node_blacklist.clone(),
            swap_counterparty: settings.swap_counterparty_pubkey.clone(),
            node_availability_url: settings.node_availability_url.clone(),
            collaborator_timeout: settings.collaborator_timeout(),
            action_delay: settings.action_delay(),
            max_payload_chars: settings.max_payload_chars,
            enrichment_concurrency: settings.enrichment_concurrency,
        }
    }
}

/// Turns planner action requests into validated, gated, executed results.
pub struct ActionDispatcher {
    collaborators: Collaborators,
    confirmer: Box<dyn Confirmer>,
    settings: DispatchSettings,
    graph: RwLock<NodeGraphCache>,
    stats: Arc<AgentStats>,
}

#[derive(Deserialize)]
struct ConnectPeerArgs {
    node_pubkey: String,
    host_port: String,
}

#[derive(Deserialize)]
struct BatchConnectArgs {
    peers: Vec<ConnectPeerArgs>,
}

#[derive(Deserialize)]
struct PubkeyArgs {
    pubkey: String,
}

#[derive(Deserialize)]
struct SetFeePolicyArgs {
    channel_id: String,
    fee_rate: u64,
    base_fee_msat: Option<u64>,
}

#[derive(Deserialize)]
struct OpenChannelArgs {
    node_pubkey: String,
    local_funding_amount_sat: u64,
    sat_per_vbyte: Option<u64>,
}

#[derive(Deserialize)]
struct BatchOpenArgs {
    channels: Vec<ChannelAllocation>,
    sat_per_vbyte: Option<u64>,
}

#[derive(Deserialize)]
struct CandidateArgs {
    pub_key: String,
}

#[derive(Deserialize)]
struct ProposeOpensArgs {
    peers: Vec<CandidateArgs>,
    sat_per_vbyte: u64,
}

#[derive(Deserialize)]
struct ExecuteOpensArgs {
    operations: Vec<OpenOperation>,
}

#[derive(Deserialize)]
struct CloseChannelArgs {
    channel_id: String,
    sat_per_vbyte: Option<u64>,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct LimitArgs {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct AvailabilityArgs {
    url: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct PeerNetworkArgs {
    start_pubkey: String,
    max_depth: Option<usize>,
    peers_per_level: Option<usize>,
}

#[derive(Deserialize)]
struct RebalanceArgs {
    outgoing_channel_id: String,
    incoming_channel_id: String,
    amount_sats: u64,
}

#[derive(Deserialize)]
struct QuoteArgs {
    channel_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ChannelArgs {
    channel_id: String,
}

#[derive(Deserialize)]
struct FeeAdjustmentArgs {
    #[serde(default)]
    strategy: FeeStrategy,
}

pub fn parse_channel_id(field: &str, raw: &str) -> Result<ChannelId, AppError> {
    raw.trim()
        .parse::<ChannelId>()
        .map_err(|_| AppError::validation(field, format!("`{raw}` is not a numeric channel id")))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}

fn classify_role(average_ppm: Option<f64>, cutoff_ppm: u64) -> LiquidityRole {
    match average_ppm {
        Some(avg) if avg < cutoff_ppm as f64 => LiquidityRole::Source,
        Some(_) => LiquidityRole::Sink,
        None => LiquidityRole::Unknown,
    }
}

/// Bootstrapping nodes take any well-connected peer; established nodes only
/// take liquidity sources. Input order (connectivity rank) is kept.
pub fn suitable_peers(candidates: &[PeerCandidate], bootstrapping: bool) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| bootstrapping || c.role == LiquidityRole::Source)
        .map(|c| c.pub_key.clone())
        .collect()
}

impl ActionDispatcher {
    pub fn new(
        collaborators: Collaborators,
        confirmer: Box<dyn Confirmer>,
        settings: DispatchSettings,
        stats: Arc<AgentStats>,
    ) -> Self {
        Self {
            collaborators,
            confirmer,
            settings,
            graph: RwLock::new(NodeGraphCache::new()),
            stats,
        }
    }

    /// Executes requests in order, one at a time, then applies the payload cap.
    pub async fn execute_batch(&self, requests: &[ActionRequest]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            if i > 0 && !self.settings.action_delay.is_zero() {
                tokio::time::sleep(self.settings.action_delay).await;
            }
            results.push(self.execute(request).await);
        }
        self.cap_payload(results)
    }

    pub async fn execute(&self, request: &ActionRequest) -> ActionResult {
        let Some(kind) = ActionKind::from_name(&request.name) else {
            tracing::warn!(target: "dispatch", action = %request.name, "unknown action requested");
            AgentStats::incr(&self.stats.actions_failed);
            return ActionResult::error(
                request,
                format!("Unknown function requested by model: {}", request.name),
                "unknown_action",
            );
        };

        if let Some(message) = &request.arg_error {
            return self.failed(
                request,
                AppError::validation("arguments", format!("unreadable arguments: {message}")),
            );
        }

        let args = match coerce(&request.args, kind.params()) {
            Ok(args) => args,
            Err(e) => return self.failed(request, e),
        };

        if kind.is_sensitive() && !self.confirmer.confirm(kind.name(), &args).await {
            tracing::info!(target: "dispatch", action = kind.name(), "execution denied");
            AgentStats::incr(&self.stats.actions_denied);
            let denied = AppError::Denied(kind.name().to_string());
            return ActionResult::error(request, denied.to_string(), denied.kind());
        }

        let shown = Value::Object(args.clone());
        tracing::info!(target: "dispatch", action = kind.name(), args = %shown, "executing action");
        let outcome = with_timeout(
            kind.name(),
            self.settings.collaborator_timeout,
            self.run(kind, args),
        )
        .await;
        match outcome {
            Ok(output) => {
                AgentStats::incr(&self.stats.actions_executed);
                tracing::debug!(
                    target: "dispatch",
                    action = kind.name(),
                    output = %preview(&output.to_string(), 400),
                    "action completed"
                );
                ActionResult::ok(request, output)
            }
            Err(e) => self.failed(request, e),
        }
    }

    fn failed(&self, request: &ActionRequest, err: AppError) -> ActionResult {
        AgentStats::incr(&self.stats.actions_failed);
        tracing::warn!(target: "dispatch", action = %request.name, kind = err.kind(), error = %err, "action failed");
        ActionResult::error(request, err.to_string(), err.kind())
    }

    /// Replaces the whole batch with one guidance error when the serialized
    /// outputs exceed the payload ceiling.
    pub fn cap_payload(&self, results: Vec<ActionResult>) -> Vec<ActionResult> {
        let size: usize = results.iter().map(|r| r.output.to_string().len()).sum();
        let limit = self.settings.max_payload_chars;
        if size <= limit {
            return results;
        }
        AgentStats::incr(&self.stats.payload_rejections);
        tracing::warn!(target: "dispatch", size, limit, actions = results.len(), "action results exceed payload ceiling");
        let err = AppError::PayloadTooLarge { size, limit };
        vec![ActionResult::synthetic_error(err.to_string(), err.kind())]
    }

    pub async fn graph_len(&self) -> usize {
        self.graph.read().await.len()
    }

    async fn run(&self, kind: ActionKind, args: Map<String, Value>) -> Result<Value, AppError> {
        let lnd = self.collaborators.lnd.as_ref();
        let swap = self.collaborators.swap.as_ref();
        let directory = self.collaborators.directory.as_ref();
        let policy = &self.settings.policy;

        match kind {
            ActionKind::GetNodeInfo => to_json(&lnd.node_info().await?),
            ActionKind::GetWalletBalance => to_json(&lnd.wallet_balance().await?),
            ActionKind::GetChannelBalance => to_json(&lnd.channel_balance().await?),
            ActionKind::ListChannels => {
                let channels = lnd.list_channels().await?;
                Ok(json!({ "channels": channels }))
            }
            ActionKind::ListPeers => {
                let peers = lnd.list_peers().await?;
                Ok(json!({ "peers": peers }))
            }
            ActionKind::ConnectPeer => {
                let args: ConnectPeerArgs = parse_args(args)?;
                lnd.connect_peer(&args.node_pubkey, &args.host_port).await?;
                Ok(json!({ "status": "OK", "node_pubkey": args.node_pubkey }))
            }
            ActionKind::BatchConnectPeers => {
                let args: BatchConnectArgs = parse_args(args)?;
                let mut results = Vec::with_capacity(args.peers.len());
                for peer in args.peers {
                    let entry = match lnd.connect_peer(&peer.node_pubkey, &peer.host_port).await {
                        Ok(()) => json!({ "node_pubkey": peer.node_pubkey, "status": "OK" }),
                        Err(e) => json!({ "node_pubkey": peer.node_pubkey, "status": "ERROR", "error": e.to_string() }),
                    };
                    results.push(entry);
                }
                Ok(json!({ "results": results }))
            }
            ActionKind::GetNodeUri => {
                let args: PubkeyArgs = parse_args(args)?;
                let sockets = directory.node_sockets(&args.pubkey).await?;
                let uris: Vec<String> = sockets.iter().map(|s| format!("{}@{s}", args.pubkey)).collect();
                Ok(json!({ "pubkey": args.pubkey, "sockets": sockets, "uris": uris }))
            }
            ActionKind::SetFeePolicy => {
                let args: SetFeePolicyArgs = parse_args(args)?;
                let chan_id = parse_channel_id("channel_id", &args.channel_id)?;
                let report = lnd.fee_report().await?;
                let current = report
                    .iter()
                    .find(|f| f.chan_id == chan_id)
                    .ok_or_else(|| AppError::NotFound(format!("Channel {chan_id} not found.")))?;
                let base_fee = args.base_fee_msat.unwrap_or(current.base_fee_msat);
                lnd.set_fee_policy(&current.channel_point, base_fee, args.fee_rate)
                    .await?;
                Ok(json!({
                    "status": "OK",
                    "channel_id": chan_id,
                    "previous_fee_rate_ppm": current.fee_rate_ppm,
                    "fee_rate_ppm": args.fee_rate,
                    "base_fee_msat": base_fee,
                }))
            }
            ActionKind::OpenChannel => {
                let args: OpenChannelArgs = parse_args(args)?;
                let op = OpenOperation::Single {
                    node_pubkey: args.node_pubkey,
                    local_funding_amount_sat: args.local_funding_amount_sat,
                    sat_per_vbyte: args.sat_per_vbyte,
                };
                openings::execute_operation(lnd, policy, &op).await
            }
            ActionKind::BatchOpenChannel => {
                let args: BatchOpenArgs = parse_args(args)?;
                let op = OpenOperation::Batch {
                    channels: args.channels,
                    sat_per_vbyte: args.sat_per_vbyte,
                };
                openings::execute_operation(lnd, policy, &op).await
            }
            ActionKind::ProposeChannelOpens => {
                let args: ProposeOpensArgs = parse_args(args)?;
                let requested: Vec<String> = args.peers.into_iter().map(|p| p.pub_key).collect();
                let premium = PremiumPeer {
                    pubkey: &self.settings.swap_counterparty,
                    amount_sat: policy.premium_channel_sat,
                };
                let proposal = openings::propose(
                    lnd,
                    policy,
                    &self.settings.node_blacklist,
                    premium,
                    &requested,
                    args.sat_per_vbyte,
                )
                .await?;
                to_json(&proposal)
            }
            ActionKind::ExecuteChannelOpens => {
                let args: ExecuteOpensArgs = parse_args(args)?;
                let mut results = Vec::with_capacity(args.operations.len());
                for op in &args.operations {
                    let entry = match openings::execute_operation(lnd, policy, op).await {
                        Ok(v) => v,
                        Err(e) => json!({ "status": "ERROR", "error": e.to_string(), "kind": e.kind() }),
                    };
                    results.push(entry);
                }
                Ok(json!({ "results": results }))
            }
            ActionKind::CloseChannel => {
                let args: CloseChannelArgs = parse_args(args)?;
                let chan_id = parse_channel_id("channel_id", &args.channel_id)?;
                let channels = lnd.list_channels().await?;
                let channel = channels
                    .iter()
                    .find(|c| c.chan_id == chan_id)
                    .ok_or_else(|| AppError::NotFound(format!("Channel {chan_id} not found.")))?;
                let closing_txid = lnd
                    .close_channel(&channel.channel_point, args.force, args.sat_per_vbyte)
                    .await?;
                Ok(json!({
                    "status": "OK",
                    "channel_id": chan_id,
                    "channel_point": channel.channel_point,
                    "force": args.force,
                    "closing_txid": closing_txid,
                }))
            }
            ActionKind::ProposeChannelCloses => to_json(&closures::propose(lnd, policy).await?),
            ActionKind::GetFeeRecommendations => to_json(&directory.fee_recommendations().await?),
            ActionKind::GetTopAndFilterNodes => {
                let args: LimitArgs = parse_args(args)?;
                self.top_and_filter_nodes(args.limit.unwrap_or(10)).await
            }
            ActionKind::GetNodeAvailabilityData => {
                let args: AvailabilityArgs = parse_args(args)?;
                let url = args
                    .url
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| self.settings.node_availability_url.clone());
                let snapshot = directory.node_availability(&url).await?;
                let top = {
                    let mut graph = self.graph.write().await;
                    graph.replace_from(&snapshot);
                    graph.top_by_score(args.limit.unwrap_or(5))
                };
                Ok(json!({
                    "status": "OK",
                    "summary": {
                        "last_updated": snapshot.last_updated,
                        "max_score": snapshot.max_score,
                        "num_scored": snapshot.num_scored,
                        "num_stable": snapshot.num_stable,
                        "num_unstable": snapshot.num_unstable,
                        "num_non_connectable": snapshot.num_non_connectable,
                    },
                    "top_nodes_summary": top,
                }))
            }
            ActionKind::AnalyzePeerNetwork => {
                let args: PeerNetworkArgs = parse_args(args)?;
                let depth = args
                    .max_depth
                    .unwrap_or(policy.bfs_default_depth)
                    .min(policy.bfs_max_depth);
                let fan_out = args
                    .peers_per_level
                    .unwrap_or(policy.bfs_default_peers_per_level)
                    .min(policy.bfs_max_peers_per_level);
                let nodes = self
                    .graph
                    .read()
                    .await
                    .explore(&args.start_pubkey, depth, fan_out)?;
                Ok(json!({
                    "status": "OK",
                    "message": format!("Network analysis completed for {} nodes up to depth {depth}.", nodes.len()),
                    "nodes": nodes,
                }))
            }
            ActionKind::AnalyzeChannelLiquidityFlow => {
                let analysis =
                    analyzer::analyze_node(lnd, policy.flow_window_days, policy.trend_tolerance_pct)
                        .await?;
                Ok(json!({ "status": "OK", "channels": analysis }))
            }
            ActionKind::FindRebalanceOpportunities => {
                let channels = lnd.list_channels().await?;
                let found = rebalance::find_opportunities(
                    &channels,
                    policy.high_outbound_pct,
                    policy.low_outbound_pct,
                    &self.settings.swap_counterparty,
                );
                to_json(&rebalance::report(&channels, found))
            }
            ActionKind::ExecuteRebalance => {
                let args: RebalanceArgs = parse_args(args)?;
                let outgoing = parse_channel_id("outgoing_channel_id", &args.outgoing_channel_id)?;
                let incoming = parse_channel_id("incoming_channel_id", &args.incoming_channel_id)?;
                let outcome = rebalance::execute_rebalance(
                    lnd,
                    policy,
                    &self.settings.swap_counterparty,
                    outgoing,
                    incoming,
                    args.amount_sats,
                )
                .await?;
                to_json(&outcome)
            }
            ActionKind::CalculateAndQuoteLoopOuts => {
                let args: QuoteArgs = parse_args(args)?;
                let ids = args
                    .channel_ids
                    .iter()
                    .map(|raw| parse_channel_id("channel_ids", raw))
                    .collect::<Result<Vec<_>, _>>()?;
                let plans = swaps::quote_batch(lnd, swap, policy, &ids).await?;
                Ok(json!({ "status": "OK", "quotes": plans }))
            }
            ActionKind::InitiateLoopOut => {
                let args: ChannelArgs = parse_args(args)?;
                let chan_id = parse_channel_id("channel_id", &args.channel_id)?;
                to_json(&swaps::initiate(lnd, swap, policy, chan_id).await?)
            }
            ActionKind::ListLoopOutSwaps => {
                let recent = swaps::recent_swaps(swap, chrono::Utc::now()).await?;
                Ok(json!({ "status": "OK", "swaps": recent }))
            }
            ActionKind::ShouldOpenToLoop => to_json(
                &openings::should_open_to_loop(lnd, policy, &self.settings.swap_counterparty).await?,
            ),
            ActionKind::ProposeFeeAdjustments => {
                let args: FeeAdjustmentArgs = parse_args(args)?;
                let report =
                    fees::propose(lnd, policy, args.strategy, &self.settings.swap_counterparty).await?;
                to_json(&report)
            }
        }
    }

    async fn top_and_filter_nodes(&self, limit: usize) -> Result<Value, AppError> {
        let lnd = self.collaborators.lnd.as_ref();
        let cutoff = self.settings.policy.liquidity_source_cutoff_ppm;
        let bootstrapping = lnd.node_info().await?.num_active_channels == 0;

        let nodes: Vec<TopNode> = self
            .collaborators
            .directory
            .top_nodes(limit)
            .await?
            .into_iter()
            .filter(|n| !self.settings.node_blacklist.contains(&n.pub_key))
            .collect();

        let enriched: Vec<(TopNode, Result<NodeFeeSummary, AppError>)> = stream::iter(nodes)
            .map(|node| {
                let directory = Arc::clone(&self.collaborators.directory);
                async move {
                    let summary = directory.node_fee_summary(&node.pub_key).await;
                    (node, summary)
                }
            })
            .buffered(self.settings.enrichment_concurrency.max(1))
            .collect()
            .await;

        let candidates: Vec<PeerCandidate> = enriched
            .into_iter()
            .map(|(node, summary)| {
                let average = match summary {
                    Ok(s) => s.average_fee_rate_ppm,
                    Err(e) => {
                        tracing::debug!(target: "directory", pubkey = %node.pub_key, error = %e, "fee summary unavailable");
                        None
                    }
                };
                PeerCandidate {
                    pub_key: node.pub_key,
                    alias: node.alias,
                    connectivity: node.channels,
                    capacity_sat: node.capacity_sat,
                    average_fee_rate_ppm: average,
                    role: classify_role(average, cutoff),
                    addresses: Vec::new(),
                }
            })
            .collect();

        let suitable = suitable_peers(&candidates, bootstrapping);
        Ok(json!({
            "status": "OK",
            "bootstrapping": bootstrapping,
            "liquidity_source_cutoff_ppm": cutoff,
            "nodes": candidates,
            "suitable": suitable,
        }))
    }
}
