// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Fee proposals. Nothing here mutates the node; applying a proposal is the
//! separate, confirmed `set_fee_policy` action.

use crate::app::config::{FeeTier, PolicySettings};
use crate::domain::constants::{MSAT_PER_SAT, SECS_PER_DAY};
use crate::domain::error::AppError;
use crate::domain::types::{
    Channel, ChannelFeePolicy, ChannelId, ForwardingEvent, LiquidityClassification, LiquidityTrend,
};
use crate::infrastructure::network::ChannelManager;
use crate::services::liquidity::analyzer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStrategy {
    #[default]
    Liquidity,
    Volume,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeeProposal {
    pub channel_id: ChannelId,
    pub channel_point: String,
    pub current_fee_rate_ppm: u64,
    pub new_fee_rate_ppm: u64,
    pub reason: String,
}

fn clamp_rate(rate: u64, policy: &PolicySettings) -> u64 {
    rate.clamp(policy.min_fee_rate_ppm, policy.max_fee_rate_ppm)
}

/// Depleted channels draining outbound get a higher rate, saturated channels
/// filling inbound get a lower one. Everything else is left alone.
pub fn liquidity_proposals(
    classifications: &[LiquidityClassification],
    current: &HashMap<ChannelId, &ChannelFeePolicy>,
    policy: &PolicySettings,
) -> Vec<FeeProposal> {
    let mut proposals = Vec::new();
    for class in classifications {
        let Some(fee) = current.get(&class.channel_id) else {
            continue;
        };
        let rate = fee.fee_rate_ppm;
        let (target, reason) = match class.liquidity_trend {
            LiquidityTrend::Outbound if class.balance_ratio < policy.depleted_ratio => {
                let raised = (rate * (100 + policy.fee_raise_pct) / 100).max(rate + 1);
                (
                    raised,
                    format!(
                        "depleted: {:.0}% local with outbound flow",
                        class.balance_ratio * 100.0
                    ),
                )
            }
            LiquidityTrend::Inbound if class.balance_ratio > policy.saturated_ratio => {
                let lowered = rate * (100 - policy.fee_lower_pct) / 100;
                (
                    lowered,
                    format!(
                        "saturated: {:.0}% local with inbound flow",
                        class.balance_ratio * 100.0
                    ),
                )
            }
            _ => continue,
        };
        let new_rate = clamp_rate(target, policy);
        if new_rate == rate {
            continue;
        }
        proposals.push(FeeProposal {
            channel_id: class.channel_id,
            channel_point: fee.channel_point.clone(),
            current_fee_rate_ppm: rate,
            new_fee_rate_ppm: new_rate,
            reason,
        });
    }
    proposals
}

/// Highest tier whose threshold the volume reaches. `tiers` must be sorted ascending.
pub fn tier_rate(tiers: &[FeeTier], volume_sat: u64) -> Option<u64> {
    tiers
        .iter()
        .take_while(|t| t.min_volume_sat <= volume_sat)
        .last()
        .map(|t| t.fee_rate_ppm)
}

/// Outbound volume attributed to each counterparty, in sat.
pub fn counterparty_volumes(
    channels: &[Channel],
    events: &[ForwardingEvent],
) -> HashMap<String, u64> {
    let owner: HashMap<ChannelId, &str> = channels
        .iter()
        .map(|c| (c.chan_id, c.remote_pubkey.as_str()))
        .collect();
    let mut volumes: HashMap<String, u64> = HashMap::new();
    for event in events {
        if let Some(pubkey) = owner.get(&event.chan_id_out) {
            let entry = volumes.entry(pubkey.to_string()).or_default();
            *entry = entry.saturating_add(event.amt_out_msat / MSAT_PER_SAT);
        }
    }
    volumes
}

pub fn volume_proposals(
    channels: &[Channel],
    events: &[ForwardingEvent],
    current: &HashMap<ChannelId, &ChannelFeePolicy>,
    policy: &PolicySettings,
    premium_pubkey: &str,
) -> Vec<FeeProposal> {
    let tiers = policy.sorted_tiers();
    let volumes = counterparty_volumes(channels, events);
    let mut proposals = Vec::new();
    for channel in channels {
        let Some(fee) = current.get(&channel.chan_id) else {
            continue;
        };
        let volume = volumes.get(&channel.remote_pubkey).copied().unwrap_or(0);
        let floor = if channel.remote_pubkey == premium_pubkey {
            policy.premium_volume_floor_ppm
        } else {
            policy.volume_floor_ppm
        };
        let tiered = tier_rate(&tiers, volume).unwrap_or(floor);
        let new_rate = clamp_rate(tiered.max(floor), policy);
        if new_rate == fee.fee_rate_ppm {
            continue;
        }
        proposals.push(FeeProposal {
            channel_id: channel.chan_id,
            channel_point: fee.channel_point.clone(),
            current_fee_rate_ppm: fee.fee_rate_ppm,
            new_fee_rate_ppm: new_rate,
            reason: format!("{volume} sat routed to counterparty over the window"),
        });
    }
    proposals
}

#[derive(Debug, Serialize)]
pub struct FeeAdjustmentReport {
    pub status: &'static str,
    pub strategy: FeeStrategy,
    pub message: String,
    pub proposals: Vec<FeeProposal>,
}

pub async fn propose(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    strategy: FeeStrategy,
    premium_pubkey: &str,
) -> Result<FeeAdjustmentReport, AppError> {
    let channels = lnd.list_channels().await?;
    let events = lnd
        .forwarding_history(Duration::from_secs(policy.flow_window_days * SECS_PER_DAY))
        .await?;
    let report = lnd.fee_report().await?;
    let current: HashMap<ChannelId, &ChannelFeePolicy> =
        report.iter().map(|f| (f.chan_id, f)).collect();

    let proposals = match strategy {
        FeeStrategy::Liquidity => {
            let classes = analyzer::analyze(&channels, &events, policy.trend_tolerance_pct);
            liquidity_proposals(&classes, &current, policy)
        }
        FeeStrategy::Volume => volume_proposals(&channels, &events, &current, policy, premium_pubkey),
    };
    tracing::info!(
        target: "liquidity",
        ?strategy,
        proposals = proposals.len(),
        "fee adjustments proposed"
    );
    let message = if proposals.is_empty() {
        "No fee adjustments needed.".to_string()
    } else {
        format!(
            "Proposed {} fee adjustments. Apply each with set_fee_policy.",
            proposals.len()
        )
    };
    Ok(FeeAdjustmentReport {
        status: "OK",
        strategy,
        message,
        proposals,
    })
}
