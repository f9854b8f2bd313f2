// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Ask on the operator console.
    #[default]
    Console,
    AutoApprove,
    AutoDeny,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_network")]
    pub network: String,

    // Node daemon (REST)
    #[serde(default = "default_lnd_rest_url")]
    pub lnd_rest_url: String,
    pub lnd_macaroon_path: Option<String>,
    pub lnd_macaroon_hex: Option<String>,
    pub lnd_tls_cert_path: Option<String>,

    // Swap daemon (REST)
    #[serde(default = "default_loop_rest_url")]
    pub loop_rest_url: String,
    pub loop_macaroon_path: Option<String>,
    pub loop_macaroon_hex: Option<String>,
    pub loop_tls_cert_path: Option<String>,

    // Planner
    #[serde(default = "default_planner_url")]
    pub planner_url: String,
    #[serde(default = "default_planner_model")]
    pub planner_model: String,
    pub planner_api_key: Option<String>,

    // Directories
    #[serde(default = "default_mempool_api_url")]
    pub mempool_api_url: String,
    #[serde(default = "default_node_availability_url")]
    pub node_availability_url: String,

    // Agent loop
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_planner_timeout_secs")]
    pub planner_timeout_secs: u64,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,
    #[serde(default = "default_max_payload_chars")]
    pub max_payload_chars: usize,
    #[serde(default = "default_max_rounds_per_tick")]
    pub max_rounds_per_tick: usize,
    #[serde(default)]
    pub confirmation_mode: ConfirmationMode,
    #[serde(default = "default_node_blacklist")]
    pub node_blacklist: Vec<String>,
    #[serde(default = "default_swap_counterparty_pubkey")]
    pub swap_counterparty_pubkey: String,
    #[serde(default = "default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,

    // Circuit breaker
    #[serde(default = "default_safety_max_failures")]
    pub safety_max_failures: u64,
    #[serde(default = "default_safety_reset_secs")]
    pub safety_reset_secs: u64,

    // Metrics (0 disables the endpoint)
    #[serde(default)]
    pub metrics_port: u16,
    pub metrics_bind: Option<String>,

    #[serde(default)]
    pub policy: PolicySettings,
}

/// Every tunable constant of the liquidity engines.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PolicySettings {
    // Rebalance matcher
    pub high_outbound_pct: u64,
    pub low_outbound_pct: u64,
    pub max_rebalance_sat: u64,
    pub rebalance_fee_limit_ppm: u64,

    // Liquidity analyzer
    pub trend_tolerance_pct: u64,
    pub flow_window_days: u64,

    // Fee engine (liquidity strategy)
    pub depleted_ratio: f64,
    pub saturated_ratio: f64,
    pub fee_raise_pct: u64,
    pub fee_lower_pct: u64,
    pub min_fee_rate_ppm: u64,
    pub max_fee_rate_ppm: u64,

    // Fee engine (volume strategy)
    pub volume_tiers: Vec<FeeTier>,
    pub volume_floor_ppm: u64,
    pub premium_volume_floor_ppm: u64,

    // Opening planner
    pub onchain_reserve_sat: u64,
    pub min_channel_sat: u64,
    pub premium_channel_sat: u64,
    pub premium_min_onchain_sat: u64,
    pub premium_min_inbound_sat: u64,
    pub liquidity_source_cutoff_ppm: u64,

    // Swap planner
    pub swap_ceiling_sat: u64,
    pub swap_fee_ppm: u64,
    pub swap_routing_fee_ppm: u64,
    pub max_prepay_sat: u64,
    pub prepay_routing_fee_ppm: u64,
    pub sweep_conf_target: u32,

    // Close candidates
    pub close_min_age_days: u64,
    pub close_window_days: u64,
    pub close_percentile_divisor: usize,

    // Peer-network exploration
    pub bfs_default_depth: usize,
    pub bfs_default_peers_per_level: usize,
    pub bfs_max_depth: usize,
    pub bfs_max_peers_per_level: usize,
}

/// Routed volume at or above `min_volume_sat` maps to `fee_rate_ppm`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FeeTier {
    pub min_volume_sat: u64,
    pub fee_rate_ppm: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            high_outbound_pct: constants::DEFAULT_HIGH_OUTBOUND_PCT,
            low_outbound_pct: constants::DEFAULT_LOW_OUTBOUND_PCT,
            max_rebalance_sat: constants::DEFAULT_MAX_REBALANCE_SAT,
            rebalance_fee_limit_ppm: constants::DEFAULT_REBALANCE_FEE_LIMIT_PPM,
            trend_tolerance_pct: constants::DEFAULT_TREND_TOLERANCE_PCT,
            flow_window_days: constants::FLOW_WINDOW_DAYS,
            depleted_ratio: 0.20,
            saturated_ratio: 0.80,
            fee_raise_pct: 25,
            fee_lower_pct: 25,
            min_fee_rate_ppm: 1,
            max_fee_rate_ppm: 5_000,
            volume_tiers: default_volume_tiers(),
            volume_floor_ppm: 50,
            premium_volume_floor_ppm: 1_000,
            onchain_reserve_sat: constants::DEFAULT_ONCHAIN_RESERVE_SAT,
            min_channel_sat: constants::DEFAULT_MIN_CHANNEL_SAT,
            premium_channel_sat: constants::DEFAULT_PREMIUM_CHANNEL_SAT,
            premium_min_onchain_sat: constants::DEFAULT_PREMIUM_MIN_ONCHAIN_SAT,
            premium_min_inbound_sat: constants::DEFAULT_PREMIUM_MIN_INBOUND_SAT,
            liquidity_source_cutoff_ppm: constants::DEFAULT_LIQUIDITY_SOURCE_CUTOFF_PPM,
            swap_ceiling_sat: constants::DEFAULT_SWAP_CEILING_SAT,
            swap_fee_ppm: constants::DEFAULT_SWAP_FEE_PPM,
            swap_routing_fee_ppm: constants::DEFAULT_SWAP_ROUTING_FEE_PPM,
            max_prepay_sat: constants::DEFAULT_MAX_PREPAY_SAT,
            prepay_routing_fee_ppm: constants::DEFAULT_PREPAY_ROUTING_FEE_PPM,
            sweep_conf_target: constants::DEFAULT_SWEEP_CONF_TARGET,
            close_min_age_days: constants::CLOSE_WINDOW_DAYS,
            close_window_days: constants::CLOSE_WINDOW_DAYS,
            close_percentile_divisor: 10,
            bfs_default_depth: constants::DEFAULT_BFS_DEPTH,
            bfs_default_peers_per_level: constants::DEFAULT_BFS_PEERS_PER_LEVEL,
            bfs_max_depth: constants::MAX_BFS_DEPTH,
            bfs_max_peers_per_level: constants::MAX_BFS_PEERS_PER_LEVEL,
        }
    }
}

// Defaults
fn default_false() -> bool {
    false
}
fn default_network() -> String {
    "mainnet".to_string()
}
fn default_lnd_rest_url() -> String {
    "https://localhost:8080".to_string()
}
fn default_loop_rest_url() -> String {
    "https://localhost:8081".to_string()
}
fn default_planner_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_planner_model() -> String {
    "google/gemini-2.5-flash".to_string()
}
fn default_mempool_api_url() -> String {
    constants::DEFAULT_MEMPOOL_API_URL.to_string()
}
fn default_node_availability_url() -> String {
    constants::DEFAULT_NODE_AVAILABILITY_URL.to_string()
}
fn default_tick_interval_secs() -> u64 {
    constants::DEFAULT_TICK_INTERVAL_SECS
}
fn default_planner_timeout_secs() -> u64 {
    constants::DEFAULT_PLANNER_TIMEOUT_SECS
}
fn default_collaborator_timeout_secs() -> u64 {
    constants::DEFAULT_COLLABORATOR_TIMEOUT_SECS
}
fn default_action_delay_ms() -> u64 {
    constants::DEFAULT_ACTION_DELAY_MS
}
fn default_max_history_length() -> usize {
    constants::DEFAULT_MAX_HISTORY_LENGTH
}
fn default_max_payload_chars() -> usize {
    constants::DEFAULT_MAX_PAYLOAD_CHARS
}
fn default_max_rounds_per_tick() -> usize {
    constants::DEFAULT_MAX_ROUNDS_PER_TICK
}
fn default_node_blacklist() -> Vec<String> {
    constants::DEFAULT_NODE_BLACKLIST
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_swap_counterparty_pubkey() -> String {
    constants::LOOP_NODE_PUBKEY.to_string()
}
fn default_enrichment_concurrency() -> usize {
    constants::DEFAULT_ENRICHMENT_CONCURRENCY
}
fn default_safety_max_failures() -> u64 {
    3
}
fn default_safety_reset_secs() -> u64 {
    1_800
}
fn default_volume_tiers() -> Vec<FeeTier> {
    vec![
        FeeTier {
            min_volume_sat: 0,
            fee_rate_ppm: 100,
        },
        FeeTier {
            min_volume_sat: 1_000_000,
            fee_rate_ppm: 250,
        },
        FeeTier {
            min_volume_sat: 10_000_000,
            fee_rate_ppm: 500,
        },
        FeeTier {
            min_volume_sat: 50_000_000,
            fee_rate_ppm: 1_000,
        },
    ]
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = resolve_config_path(path) {
            builder = builder.add_source(File::from(Path::new(&selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Deterministic precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("node_blacklist"),
        );

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (name, raw) in [
            ("lnd_rest_url", &self.lnd_rest_url),
            ("loop_rest_url", &self.loop_rest_url),
            ("planner_url", &self.planner_url),
            ("mempool_api_url", &self.mempool_api_url),
            ("node_availability_url", &self.node_availability_url),
        ] {
            Url::parse(raw)
                .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        for (name, secs) in [
            ("tick_interval_secs", self.tick_interval_secs),
            ("planner_timeout_secs", self.planner_timeout_secs),
            ("collaborator_timeout_secs", self.collaborator_timeout_secs),
        ] {
            if secs == 0 {
                return Err(AppError::Config(format!("{name} must be positive")));
            }
        }
        if self.max_payload_chars == 0 {
            return Err(AppError::Config("max_payload_chars must be positive".into()));
        }
        if self.max_rounds_per_tick == 0 {
            return Err(AppError::Config("max_rounds_per_tick must be positive".into()));
        }
        if self.max_history_length < 2 {
            return Err(AppError::Config(
                "max_history_length must hold at least one exchange".into(),
            ));
        }
        if self.enrichment_concurrency == 0 {
            return Err(AppError::Config(
                "enrichment_concurrency must be positive".into(),
            ));
        }
        self.policy.validate()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn planner_timeout(&self) -> Duration {
        Duration::from_secs(self.planner_timeout_secs)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    /// Hex macaroon for the node daemon, read from disk when only a path is set.
    pub fn lnd_macaroon(&self) -> Result<String, AppError> {
        resolve_macaroon(
            "lnd",
            self.lnd_macaroon_hex.as_deref(),
            self.lnd_macaroon_path.as_deref(),
        )
    }

    pub fn loop_macaroon(&self) -> Result<String, AppError> {
        resolve_macaroon(
            "loop",
            self.loop_macaroon_hex.as_deref(),
            self.loop_macaroon_path.as_deref(),
        )
    }

    pub fn planner_api_key_value(&self) -> Option<String> {
        self.planner_api_key
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn metrics_bind_value(&self) -> String {
        self.metrics_bind
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }
}

impl PolicySettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.low_outbound_pct >= self.high_outbound_pct || self.high_outbound_pct > 100 {
            return Err(AppError::Config(format!(
                "rebalance thresholds must satisfy low < high <= 100 (low={}, high={})",
                self.low_outbound_pct, self.high_outbound_pct
            )));
        }
        if !(0.0..=1.0).contains(&self.depleted_ratio)
            || !(0.0..=1.0).contains(&self.saturated_ratio)
            || self.depleted_ratio >= self.saturated_ratio
        {
            return Err(AppError::Config(format!(
                "fee ratios must satisfy 0 <= depleted < saturated <= 1 (depleted={}, saturated={})",
                self.depleted_ratio, self.saturated_ratio
            )));
        }
        if self.fee_lower_pct >= 100 {
            return Err(AppError::Config("fee_lower_pct must be below 100".into()));
        }
        if self.min_fee_rate_ppm > self.max_fee_rate_ppm {
            return Err(AppError::Config(
                "min_fee_rate_ppm must not exceed max_fee_rate_ppm".into(),
            ));
        }
        if self.volume_tiers.is_empty() {
            return Err(AppError::Config("volume_tiers must not be empty".into()));
        }
        if self.min_channel_sat == 0 || self.swap_ceiling_sat == 0 {
            return Err(AppError::Config(
                "min_channel_sat and swap_ceiling_sat must be positive".into(),
            ));
        }
        if self.flow_window_days == 0 || self.close_window_days == 0 {
            return Err(AppError::Config("analysis windows must be positive".into()));
        }
        if self.close_percentile_divisor == 0 {
            return Err(AppError::Config(
                "close_percentile_divisor must be positive".into(),
            ));
        }
        if self.bfs_default_depth > self.bfs_max_depth
            || self.bfs_default_peers_per_level > self.bfs_max_peers_per_level
        {
            return Err(AppError::Config(
                "BFS defaults must not exceed their caps".into(),
            ));
        }
        Ok(())
    }

    /// Sorted by ascending volume threshold.
    pub fn sorted_tiers(&self) -> Vec<FeeTier> {
        let mut tiers = self.volume_tiers.clone();
        tiers.sort_by_key(|t| t.min_volume_sat);
        tiers
    }
}

fn resolve_macaroon(
    service: &str,
    inline_hex: Option<&str>,
    path: Option<&str>,
) -> Result<String, AppError> {
    if let Some(raw) = inline_hex.map(str::trim).filter(|s| !s.is_empty()) {
        hex::decode(raw)
            .map_err(|e| AppError::Config(format!("{service} macaroon is not valid hex: {e}")))?;
        return Ok(raw.to_string());
    }
    let path = path
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "{service} macaroon missing: set {}_MACAROON_HEX or {}_MACAROON_PATH",
                service.to_ascii_uppercase(),
                service.to_ascii_uppercase()
            ))
        })?;
    let bytes = fs::read(path)
        .map_err(|e| AppError::Config(format!("failed to read {service} macaroon {path}: {e}")))?;
    Ok(hex::encode(bytes))
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    if let Some(path) = path {
        return Some(path.to_string());
    }
    ["config.toml", "config.local.toml"]
        .iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(|p| p.to_string())
}
