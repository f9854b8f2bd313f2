// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::conversation::ToolDeclaration;
use crate::services::agent::schema::{ParamSpec, ParamType, object_schema};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GetNodeInfo,
    GetWalletBalance,
    GetChannelBalance,
    ListChannels,
    ListPeers,
    ConnectPeer,
    BatchConnectPeers,
    GetNodeUri,
    SetFeePolicy,
    OpenChannel,
    BatchOpenChannel,
    ProposeChannelOpens,
    ExecuteChannelOpens,
    CloseChannel,
    ProposeChannelCloses,
    GetFeeRecommendations,
    GetTopAndFilterNodes,
    GetNodeAvailabilityData,
    AnalyzePeerNetwork,
    AnalyzeChannelLiquidityFlow,
    FindRebalanceOpportunities,
    ExecuteRebalance,
    CalculateAndQuoteLoopOuts,
    InitiateLoopOut,
    ListLoopOutSwaps,
    ShouldOpenToLoop,
    ProposeFeeAdjustments,
}

const NO_PARAMS: &[ParamSpec] = &[];

const PEER_FIELDS: &[ParamSpec] = &[
    ParamSpec::required("node_pubkey", ParamType::String, "Public key of the peer."),
    ParamSpec::required("host_port", ParamType::String, "Address as host:port."),
];

const ALLOCATION_FIELDS: &[ParamSpec] = &[
    ParamSpec::required("node_pubkey", ParamType::String, "Public key of the peer."),
    ParamSpec::required(
        "local_funding_amount_sat",
        ParamType::Integer,
        "Channel size in satoshis.",
    ),
];

const CANDIDATE_FIELDS: &[ParamSpec] = &[
    ParamSpec::required("pub_key", ParamType::String, "Public key of the candidate."),
    ParamSpec::optional("alias", ParamType::String, ""),
];

const OPERATION_FIELDS: &[ParamSpec] = &[
    ParamSpec::required("type", ParamType::Enum(&["single", "batch"]), "Operation type."),
    ParamSpec::optional("node_pubkey", ParamType::String, "Peer for a single open."),
    ParamSpec::optional(
        "local_funding_amount_sat",
        ParamType::Integer,
        "Channel size for a single open.",
    ),
    ParamSpec::optional("sat_per_vbyte", ParamType::Integer, "On-chain fee rate."),
    ParamSpec::optional(
        "channels",
        ParamType::ArrayOfObject(ALLOCATION_FIELDS),
        "Channels for a batch open.",
    ),
];

const CONNECT_PEER: &[ParamSpec] = PEER_FIELDS;
const BATCH_CONNECT: &[ParamSpec] = &[ParamSpec::required(
    "peers",
    ParamType::ArrayOfObject(PEER_FIELDS),
    "Peers to connect to.",
)];
const GET_NODE_URI: &[ParamSpec] = &[ParamSpec::required(
    "pubkey",
    ParamType::String,
    "Public key of the node.",
)];
const SET_FEE_POLICY: &[ParamSpec] = &[
    ParamSpec::required("channel_id", ParamType::String, "Channel id."),
    ParamSpec::required("fee_rate", ParamType::Integer, "Proportional fee in ppm."),
    ParamSpec::optional("base_fee_msat", ParamType::Integer, "Base fee in msat."),
];
const OPEN_CHANNEL: &[ParamSpec] = &[
    ParamSpec::required("node_pubkey", ParamType::String, "Public key of the peer."),
    ParamSpec::required(
        "local_funding_amount_sat",
        ParamType::Integer,
        "Channel size in satoshis.",
    ),
    ParamSpec::optional("sat_per_vbyte", ParamType::Integer, "On-chain fee rate."),
];
const BATCH_OPEN_CHANNEL: &[ParamSpec] = &[
    ParamSpec::required(
        "channels",
        ParamType::ArrayOfObject(ALLOCATION_FIELDS),
        "Channels to open in one transaction.",
    ),
    ParamSpec::optional("sat_per_vbyte", ParamType::Integer, "On-chain fee rate."),
];
const PROPOSE_CHANNEL_OPENS: &[ParamSpec] = &[
    ParamSpec::required(
        "peers",
        ParamType::ArrayOfObject(CANDIDATE_FIELDS),
        "Suitable peers, best first.",
    ),
    ParamSpec::required("sat_per_vbyte", ParamType::Integer, "On-chain fee rate."),
];
const EXECUTE_CHANNEL_OPENS: &[ParamSpec] = &[ParamSpec::required(
    "operations",
    ParamType::ArrayOfObject(OPERATION_FIELDS),
    "Operations returned by propose_channel_opens.",
)];
const CLOSE_CHANNEL: &[ParamSpec] = &[
    ParamSpec::required("channel_id", ParamType::String, "Channel id."),
    ParamSpec::optional("sat_per_vbyte", ParamType::Integer, "On-chain fee rate."),
    ParamSpec::optional("force", ParamType::Boolean, "Force close."),
];
const TOP_NODES: &[ParamSpec] = &[ParamSpec::optional(
    "limit",
    ParamType::Integer,
    "Number of nodes to inspect. Default 10.",
)];
const AVAILABILITY: &[ParamSpec] = &[
    ParamSpec::optional("url", ParamType::String, "Directory URL override."),
    ParamSpec::optional("limit", ParamType::Integer, "Top nodes to return. Default 5."),
];
const PEER_NETWORK: &[ParamSpec] = &[
    ParamSpec::required("start_pubkey", ParamType::String, "Node to start from."),
    ParamSpec::optional("max_depth", ParamType::Integer, "Default 3."),
    ParamSpec::optional("peers_per_level", ParamType::Integer, "Default 3."),
];
const EXECUTE_REBALANCE: &[ParamSpec] = &[
    ParamSpec::required("outgoing_channel_id", ParamType::String, "High outbound channel."),
    ParamSpec::required("incoming_channel_id", ParamType::String, "Low outbound channel."),
    ParamSpec::required("amount_sats", ParamType::Integer, "Amount to move."),
];
const QUOTE_LOOP_OUTS: &[ParamSpec] = &[ParamSpec::required(
    "channel_ids",
    ParamType::ArrayOfString,
    "Channels to quote.",
)];
const INITIATE_LOOP_OUT: &[ParamSpec] = &[ParamSpec::required(
    "channel_id",
    ParamType::String,
    "Channel to loop out from.",
)];
const FEE_ADJUSTMENTS: &[ParamSpec] = &[ParamSpec::optional(
    "strategy",
    ParamType::Enum(&["liquidity", "volume"]),
    "Default liquidity.",
)];

impl ActionKind {
    pub const ALL: [ActionKind; 27] = [
        ActionKind::GetNodeInfo,
        ActionKind::GetWalletBalance,
        ActionKind::GetChannelBalance,
        ActionKind::ListChannels,
        ActionKind::ListPeers,
        ActionKind::ConnectPeer,
        ActionKind::BatchConnectPeers,
        ActionKind::GetNodeUri,
        ActionKind::SetFeePolicy,
        ActionKind::OpenChannel,
        ActionKind::BatchOpenChannel,
        ActionKind::ProposeChannelOpens,
        ActionKind::ExecuteChannelOpens,
        ActionKind::CloseChannel,
        ActionKind::ProposeChannelCloses,
        ActionKind::GetFeeRecommendations,
        ActionKind::GetTopAndFilterNodes,
        ActionKind::GetNodeAvailabilityData,
        ActionKind::AnalyzePeerNetwork,
        ActionKind::AnalyzeChannelLiquidityFlow,
        ActionKind::FindRebalanceOpportunities,
        ActionKind::ExecuteRebalance,
        ActionKind::CalculateAndQuoteLoopOuts,
        ActionKind::InitiateLoopOut,
        ActionKind::ListLoopOutSwaps,
        ActionKind::ShouldOpenToLoop,
        ActionKind::ProposeFeeAdjustments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::GetNodeInfo => "get_node_info",
            ActionKind::GetWalletBalance => "get_wallet_balance",
            ActionKind::GetChannelBalance => "get_channel_balance",
            ActionKind::ListChannels => "list_channels",
            ActionKind::ListPeers => "list_peers",
            ActionKind::ConnectPeer => "connect_peer",
            ActionKind::BatchConnectPeers => "batch_connect_peers",
            ActionKind::GetNodeUri => "get_node_uri",
            ActionKind::SetFeePolicy => "set_fee_policy",
            ActionKind::OpenChannel => "open_channel",
            ActionKind::BatchOpenChannel => "batch_open_channel",
            ActionKind::ProposeChannelOpens => "propose_channel_opens",
            ActionKind::ExecuteChannelOpens => "execute_channel_opens",
            ActionKind::CloseChannel => "close_channel",
            ActionKind::ProposeChannelCloses => "propose_channel_closes",
            ActionKind::GetFeeRecommendations => "get_fee_recommendations",
            ActionKind::GetTopAndFilterNodes => "get_top_and_filter_nodes",
            ActionKind::GetNodeAvailabilityData => "get_node_availability_data",
            ActionKind::AnalyzePeerNetwork => "analyze_peer_network",
            ActionKind::AnalyzeChannelLiquidityFlow => "analyze_channel_liquidity_flow",
            ActionKind::FindRebalanceOpportunities => "find_rebalance_opportunities",
            ActionKind::ExecuteRebalance => "execute_rebalance",
            ActionKind::CalculateAndQuoteLoopOuts => "calculate_and_quote_loop_outs",
            ActionKind::InitiateLoopOut => "initiate_loop_out",
            ActionKind::ListLoopOutSwaps => "list_loop_out_swaps",
            ActionKind::ShouldOpenToLoop => "should_open_to_loop",
            ActionKind::ProposeFeeAdjustments => "propose_fee_adjustments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            ActionKind::ConnectPeer => CONNECT_PEER,
            ActionKind::BatchConnectPeers => BATCH_CONNECT,
            ActionKind::GetNodeUri => GET_NODE_URI,
            ActionKind::SetFeePolicy => SET_FEE_POLICY,
            ActionKind::OpenChannel => OPEN_CHANNEL,
            ActionKind::BatchOpenChannel => BATCH_OPEN_CHANNEL,
            ActionKind::ProposeChannelOpens => PROPOSE_CHANNEL_OPENS,
            ActionKind::ExecuteChannelOpens => EXECUTE_CHANNEL_OPENS,
            ActionKind::CloseChannel => CLOSE_CHANNEL,
            ActionKind::GetTopAndFilterNodes => TOP_NODES,
            ActionKind::GetNodeAvailabilityData => AVAILABILITY,
            ActionKind::AnalyzePeerNetwork => PEER_NETWORK,
            ActionKind::ExecuteRebalance => EXECUTE_REBALANCE,
            ActionKind::CalculateAndQuoteLoopOuts => QUOTE_LOOP_OUTS,
            ActionKind::InitiateLoopOut => INITIATE_LOOP_OUT,
            ActionKind::ProposeFeeAdjustments => FEE_ADJUSTMENTS,
            ActionKind::GetNodeInfo
            | ActionKind::GetWalletBalance
            | ActionKind::GetChannelBalance
            | ActionKind::ListChannels
            | ActionKind::ListPeers
            | ActionKind::ProposeChannelCloses
            | ActionKind::GetFeeRecommendations
            | ActionKind::AnalyzeChannelLiquidityFlow
            | ActionKind::FindRebalanceOpportunities
            | ActionKind::ListLoopOutSwaps
            | ActionKind::ShouldOpenToLoop => NO_PARAMS,
        }
    }

    /// Spends funds, moves liquidity or mutates channel policy.
    pub fn is_sensitive(self) -> bool {
        matches!(
            self,
            ActionKind::SetFeePolicy
                | ActionKind::OpenChannel
                | ActionKind::BatchOpenChannel
                | ActionKind::ExecuteChannelOpens
                | ActionKind::CloseChannel
                | ActionKind::ExecuteRebalance
                | ActionKind::InitiateLoopOut
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionKind::GetNodeInfo => "Get general information about the node: alias, pubkey, channel and peer counts, sync state.",
            ActionKind::GetWalletBalance => "Get the on-chain wallet balance (total, confirmed, unconfirmed) in satoshis.",
            ActionKind::GetChannelBalance => "Get the total local and remote balance across all channels.",
            ActionKind::ListChannels => "List open channels with capacity, balances, age and peer alias.",
            ActionKind::ListPeers => "List currently connected peers.",
            ActionKind::ConnectPeer => "Connect to a peer at host:port.",
            ActionKind::BatchConnectPeers => "Connect to several peers. Each connection succeeds or fails independently.",
            ActionKind::GetNodeUri => "Get the socket addresses a node advertises, for use with connect_peer.",
            ActionKind::SetFeePolicy => "Set the proportional fee rate (ppm) of a channel. Requires confirmation.",
            ActionKind::OpenChannel => "Open one channel. The amount must fit within the confirmed balance minus the on-chain reserve. Requires confirmation.",
            ActionKind::BatchOpenChannel => "Open several channels in one transaction. Requires confirmation.",
            ActionKind::ProposeChannelOpens => "Split the available on-chain budget across suitable peers, dropping the lowest-ranked until each channel meets the minimum size. Returns operations for execute_channel_opens.",
            ActionKind::ExecuteChannelOpens => "Execute the operations returned by propose_channel_opens. Requires confirmation.",
            ActionKind::CloseChannel => "Close a channel cooperatively, or force close it. Requires confirmation.",
            ActionKind::ProposeChannelCloses => "Propose closing old channels with the lowest routed volume over the last 30 days.",
            ActionKind::GetFeeRecommendations => "Get current on-chain fee recommendations in sat/vB (fastestFee, halfHourFee, hourFee, economyFee, minimumFee).",
            ActionKind::GetTopAndFilterNodes => "Get the best-connected network nodes with their average outbound fee rates, tagged as liquidity sources or sinks, plus the subset suitable as new peers.",
            ActionKind::GetNodeAvailabilityData => "Fetch external node reliability scores and return a summary plus the top scored nodes.",
            ActionKind::AnalyzePeerNetwork => "Explore the stable peers of a node breadth-first using the fetched node availability data.",
            ActionKind::AnalyzeChannelLiquidityFlow => "Classify every channel by balance ratio and 7-day forwarding trend (inbound, outbound, balanced, stagnant).",
            ActionKind::FindRebalanceOpportunities => "Pair channels with high outbound liquidity with channels with low outbound liquidity.",
            ActionKind::ExecuteRebalance => "Move funds in a circular payment from a high outbound channel to a low outbound channel. Capped at 20000 sats. Requires confirmation.",
            ActionKind::CalculateAndQuoteLoopOuts => "Compute the Loop Out amount that brings each channel back to half its capacity and quote the swap cost.",
            ActionKind::InitiateLoopOut => "Start a Loop Out swap for a channel. Skipped if the channel already has a pending swap. Requires confirmation.",
            ActionKind::ListLoopOutSwaps => "List Loop Out swaps started in the last 24 hours, most recent first.",
            ActionKind::ShouldOpenToLoop => "Check whether on-chain funds and inbound liquidity justify opening a channel to the Loop node.",
            ActionKind::ProposeFeeAdjustments => "Propose new fee rates from channel liquidity or routed volume. Proposals must be applied with set_fee_policy.",
        }
    }

    pub fn declaration(self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: object_schema(self.params()),
        }
    }
}

pub fn tool_declarations() -> Vec<ToolDeclaration> {
    ActionKind::ALL.iter().map(|k| k.declaration()).collect()
}
