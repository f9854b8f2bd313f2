// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const MSAT_PER_SAT: u64 = 1_000;
pub const PPM_DENOMINATOR: u64 = 1_000_000;
pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Lightning Loop server node; the swap counterparty.
pub const LOOP_NODE_PUBKEY: &str =
    "021c97a90a411ff2b10dc2a8e32de2f29d2fa49d41bfbb52bd416e460db0747d0d";

/// Nodes that trigger edge cases when deploying liquidity.
pub const DEFAULT_NODE_BLACKLIST: &[&str] = &[
    // 20M minimum channel size
    "0364913d18a19c671bb36dd04d6ad5be0fe8f2894314c36a9db3f03c2d414907e1",
    // high fees
    "035e4ff418fc8b5554c5d9eea66396c227bd429a3251c8cbc711002ba215bfc226",
];

pub const DEFAULT_MEMPOOL_API_URL: &str = "https://mempool.space/api";
pub const DEFAULT_NODE_AVAILABILITY_URL: &str =
    "https://lightningcluster.com/btc_summary.json";

// =============================================================================
// LOOP CONSTANTS
// =============================================================================

pub const DEFAULT_SWAP_CEILING_SAT: u64 = 10_000_000;
pub const DEFAULT_SWEEP_CONF_TARGET: u32 = 144;
pub const DEFAULT_MAX_PREPAY_SAT: u64 = 30_000;
pub const DEFAULT_SWAP_FEE_PPM: u64 = 2_100;
pub const DEFAULT_SWAP_ROUTING_FEE_PPM: u64 = 3_500;
pub const DEFAULT_PREPAY_ROUTING_FEE_PPM: u64 = 3_000;
pub const SWAP_HISTORY_WINDOW_SECS: u64 = SECS_PER_DAY;
pub const SWAP_HISTORY_LIMIT: usize = 10;

// =============================================================================
// CAPITAL DEPLOYMENT
// =============================================================================

pub const DEFAULT_ONCHAIN_RESERVE_SAT: u64 = 1_000_000;
pub const DEFAULT_MIN_CHANNEL_SAT: u64 = 5_000_000;
pub const DEFAULT_PREMIUM_CHANNEL_SAT: u64 = 30_000_000;
pub const DEFAULT_PREMIUM_MIN_ONCHAIN_SAT: u64 = 31_000_000;
pub const DEFAULT_PREMIUM_MIN_INBOUND_SAT: u64 = 30_000_000;
pub const DEFAULT_LIQUIDITY_SOURCE_CUTOFF_PPM: u64 = 100;

// =============================================================================
// REBALANCING
// =============================================================================

pub const DEFAULT_HIGH_OUTBOUND_PCT: u64 = 75;
pub const DEFAULT_LOW_OUTBOUND_PCT: u64 = 25;
pub const DEFAULT_MAX_REBALANCE_SAT: u64 = 20_000;
pub const DEFAULT_REBALANCE_FEE_LIMIT_PPM: u64 = 4_000;
pub const DEFAULT_TREND_TOLERANCE_PCT: u64 = 10;

pub const FLOW_WINDOW_DAYS: u64 = 7;
pub const CLOSE_WINDOW_DAYS: u64 = 30;

// =============================================================================
// AGENT LOOP
// =============================================================================

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_MAX_PAYLOAD_CHARS: usize = 30_000;
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 40;
pub const DEFAULT_MAX_ROUNDS_PER_TICK: usize = 25;
pub const DEFAULT_ACTION_DELAY_MS: u64 = 1_000;
pub const DEFAULT_PLANNER_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BFS_DEPTH: usize = 3;
pub const DEFAULT_BFS_PEERS_PER_LEVEL: usize = 3;
pub const MAX_BFS_DEPTH: usize = 6;
pub const MAX_BFS_PEERS_PER_LEVEL: usize = 10;
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 4;

/// Reserved control tokens that stop the agent.
pub const EXIT_TOKENS: &[&str] = &["exit", "quit"];
