// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

#![allow(dead_code)]

use async_trait::async_trait;
use channel_steward::app::config::PolicySettings;
use channel_steward::domain::conversation::{
    ActionRequest, ConversationEntry, PlannerReply, ToolDeclaration,
};
use channel_steward::domain::error::AppError;
use channel_steward::domain::types::{
    Channel, ChannelAllocation, ChannelBalance, ChannelEdge, ChannelFeePolicy, ChannelId,
    FeeRecommendations, ForwardingEvent, Invoice, LoopOutRequest, LoopOutResponse,
    NodeAvailabilitySnapshot, NodeFeeSummary, NodeInfo, PaymentAttempt, PendingOpen, Peer,
    QueriedRoute, SwapQuote, SwapStatus, TopNode, WalletBalance,
};
use channel_steward::infrastructure::network::{
    ChannelManager, NetworkDirectory, Planner, SwapService,
};
use channel_steward::services::agent::confirm::Confirmer;
use channel_steward::services::agent::{ActionDispatcher, Collaborators, DispatchSettings};
use channel_steward::services::metrics::AgentStats;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWN_PUBKEY: &str = "02own";
pub const SWAP_PUBKEY: &str = "02loop";

pub fn channel(chan_id: ChannelId, local: u64, remote: u64) -> Channel {
    Channel {
        chan_id,
        remote_pubkey: format!("02peer{chan_id}"),
        channel_point: format!("{chan_id:064x}:0"),
        capacity: local + remote,
        local_balance: local,
        remote_balance: remote,
        lifetime_secs: 40 * 86_400,
        active: true,
        peer_alias: Some(format!("peer-{chan_id}")),
    }
}

/// In-memory node daemon that records every mutating call.
#[derive(Default)]
pub struct FakeLnd {
    pub channels: Vec<Channel>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeLnd {
    pub fn with_channels(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.into());
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChannelManager for FakeLnd {
    async fn node_info(&self) -> Result<NodeInfo, AppError> {
        Ok(NodeInfo {
            identity_pubkey: OWN_PUBKEY.into(),
            alias: "steward".into(),
            num_active_channels: self.channels.len() as u32,
            synced_to_chain: true,
            synced_to_graph: true,
            ..NodeInfo::default()
        })
    }

    async fn wallet_balance(&self) -> Result<WalletBalance, AppError> {
        Ok(WalletBalance {
            total_balance: 50_000_000,
            confirmed_balance: 50_000_000,
            unconfirmed_balance: 0,
        })
    }

    async fn channel_balance(&self) -> Result<ChannelBalance, AppError> {
        Ok(ChannelBalance {
            local_balance_sat: self.channels.iter().map(|c| c.local_balance).sum(),
            remote_balance_sat: self.channels.iter().map(|c| c.remote_balance).sum(),
        })
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, AppError> {
        Ok(self.channels.clone())
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, AppError> {
        Ok(Vec::new())
    }

    async fn connect_peer(&self, pubkey: &str, _host: &str) -> Result<(), AppError> {
        self.record(format!("connect_peer:{pubkey}"));
        Ok(())
    }

    async fn open_channel(
        &self,
        pubkey: &str,
        amount_sat: u64,
        _sat_per_vbyte: Option<u64>,
    ) -> Result<PendingOpen, AppError> {
        self.record(format!("open_channel:{pubkey}:{amount_sat}"));
        Ok(PendingOpen {
            funding_txid: "ab".repeat(32),
            output_index: 0,
        })
    }

    async fn batch_open_channel(
        &self,
        channels: &[ChannelAllocation],
        _sat_per_vbyte: Option<u64>,
    ) -> Result<Vec<PendingOpen>, AppError> {
        self.record(format!("batch_open_channel:{}", channels.len()));
        Ok(Vec::new())
    }

    async fn set_fee_policy(
        &self,
        channel_point: &str,
        _base_fee_msat: u64,
        fee_rate_ppm: u64,
    ) -> Result<(), AppError> {
        self.record(format!("set_fee_policy:{channel_point}:{fee_rate_ppm}"));
        Ok(())
    }

    async fn close_channel(
        &self,
        channel_point: &str,
        _force: bool,
        _sat_per_vbyte: Option<u64>,
    ) -> Result<Option<String>, AppError> {
        self.record(format!("close_channel:{channel_point}"));
        Ok(Some("cd".repeat(32)))
    }

    async fn forwarding_history(&self, _window: Duration) -> Result<Vec<ForwardingEvent>, AppError> {
        Ok(Vec::new())
    }

    async fn channel_info(&self, chan_id: ChannelId) -> Result<ChannelEdge, AppError> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.chan_id == chan_id)
            .ok_or_else(|| AppError::NotFound(format!("Channel {chan_id} not found.")))?;
        Ok(ChannelEdge {
            channel_id: chan_id,
            node1_pub: OWN_PUBKEY.into(),
            node2_pub: channel.remote_pubkey.clone(),
            capacity: channel.capacity,
        })
    }

    async fn node_alias(&self, _pubkey: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn fee_report(&self) -> Result<Vec<ChannelFeePolicy>, AppError> {
        Ok(self
            .channels
            .iter()
            .map(|c| ChannelFeePolicy {
                chan_id: c.chan_id,
                channel_point: c.channel_point.clone(),
                base_fee_msat: 1_000,
                fee_rate_ppm: 100,
            })
            .collect())
    }

    async fn query_route(
        &self,
        _destination: &str,
        _amt_msat: u64,
        _outgoing_chan_id: ChannelId,
        _last_hop_pubkey: &str,
        _fee_limit_msat: u64,
    ) -> Result<Option<QueriedRoute>, AppError> {
        Ok(None)
    }

    async fn add_invoice(&self, _value_msat: u64, _memo: &str) -> Result<Invoice, AppError> {
        self.record("add_invoice");
        Ok(Invoice {
            r_hash: String::new(),
            payment_addr: String::new(),
        })
    }

    async fn send_to_route(
        &self,
        _payment_hash: &str,
        _payment_addr: &str,
        _total_amt_msat: u64,
        _route: &QueriedRoute,
    ) -> Result<PaymentAttempt, AppError> {
        self.record("send_to_route");
        Ok(PaymentAttempt {
            status: "SUCCEEDED".into(),
            failure: None,
        })
    }
}

/// How the fake answers `list_swaps`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Listing {
    #[default]
    Answer,
    Fail,
    Hang,
}

/// Swap daemon whose quotes fail for one configured amount.
#[derive(Default)]
pub struct FakeSwap {
    pub failing_amount: Option<u64>,
    pub swaps: Vec<SwapStatus>,
    pub loop_outs: Mutex<Vec<LoopOutRequest>>,
    pub listing: Listing,
}

impl FakeSwap {
    pub fn loop_out_count(&self) -> usize {
        self.loop_outs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl SwapService for FakeSwap {
    async fn quote_out(&self, amount_sat: u64, _conf_target: u32) -> Result<SwapQuote, AppError> {
        if self.failing_amount == Some(amount_sat) {
            return Err(AppError::collaborator("loop", "quote unavailable"));
        }
        Ok(SwapQuote {
            amount_sat,
            swap_fee_sat: amount_sat / 1_000,
            prepay_amt_sat: 1_337,
            htlc_sweep_fee_sat: 500,
        })
    }

    async fn loop_out(&self, request: &LoopOutRequest) -> Result<LoopOutResponse, AppError> {
        self.loop_outs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(LoopOutResponse {
            id: "swap-1".into(),
            htlc_address: "bc1qhtlc".into(),
            server_message: String::new(),
        })
    }

    async fn list_swaps(&self, since_ns: u64) -> Result<Vec<SwapStatus>, AppError> {
        match self.listing {
            Listing::Answer => {}
            Listing::Fail => return Err(AppError::collaborator("loop", "daemon unavailable")),
            Listing::Hang => std::future::pending::<()>().await,
        }
        Ok(self
            .swaps
            .iter()
            .filter(|s| s.initiation_time_ns >= since_ns)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeDirectory;

#[async_trait]
impl NetworkDirectory for FakeDirectory {
    async fn fee_recommendations(&self) -> Result<FeeRecommendations, AppError> {
        Ok(FeeRecommendations {
            fastest_fee: 20,
            half_hour_fee: 12,
            hour_fee: 8,
            economy_fee: 3,
            minimum_fee: 1,
        })
    }

    async fn top_nodes(&self, _limit: usize) -> Result<Vec<TopNode>, AppError> {
        Ok(Vec::new())
    }

    async fn node_fee_summary(&self, pubkey: &str) -> Result<NodeFeeSummary, AppError> {
        Err(AppError::NotFound(format!("node {pubkey} not found")))
    }

    async fn node_sockets(&self, _pubkey: &str) -> Result<Vec<String>, AppError> {
        Ok(vec!["127.0.0.1:9735".into()])
    }

    async fn node_availability(&self, _url: &str) -> Result<NodeAvailabilitySnapshot, AppError> {
        Ok(NodeAvailabilitySnapshot::default())
    }
}

/// Replays scripted replies; an exhausted script answers with no actions.
/// The first `stalls` calls never return.
pub struct ScriptedPlanner {
    replies: Mutex<VecDeque<Result<PlannerReply, AppError>>>,
    stalls: AtomicUsize,
    pub seen_history_lens: Mutex<Vec<usize>>,
}

impl ScriptedPlanner {
    pub fn new(replies: Vec<Result<PlannerReply, AppError>>) -> Self {
        Self::stalling(0, replies)
    }

    pub fn stalling(stalls: usize, replies: Vec<Result<PlannerReply, AppError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            stalls: AtomicUsize::new(stalls),
            seen_history_lens: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(
        &self,
        _system_prompt: &str,
        history: &[ConversationEntry],
        _tools: &[ToolDeclaration],
    ) -> Result<PlannerReply, AppError> {
        self.seen_history_lens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(history.len());
        let stalled = self
            .stalls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            std::future::pending::<()>().await;
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(PlannerReply::default()))
    }
}

pub fn request(call_id: &str, name: &str, args: Value) -> ActionRequest {
    ActionRequest {
        call_id: call_id.into(),
        name: name.into(),
        args: match args {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        arg_error: None,
    }
}

pub fn dispatch_settings() -> DispatchSettings {
    DispatchSettings {
        policy: PolicySettings::default(),
        node_blacklist: vec!["02banned".into()],
        swap_counterparty: SWAP_PUBKEY.into(),
        node_availability_url: "http://127.0.0.1:1/btc_summary.json".into(),
        collaborator_timeout: Duration::from_secs(5),
        action_delay: Duration::ZERO,
        max_payload_chars: 30_000,
        enrichment_concurrency: 4,
    }
}

pub fn dispatcher(
    lnd: Arc<FakeLnd>,
    swap: Arc<FakeSwap>,
    confirmer: Box<dyn Confirmer>,
    settings: DispatchSettings,
    stats: Arc<AgentStats>,
) -> ActionDispatcher {
    ActionDispatcher::new(
        Collaborators {
            lnd,
            swap,
            directory: Arc::new(FakeDirectory),
        },
        confirmer,
        settings,
        stats,
    )
}
