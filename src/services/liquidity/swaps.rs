// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::PolicySettings;
use crate::domain::constants::{PPM_DENOMINATOR, SWAP_HISTORY_LIMIT, SWAP_HISTORY_WINDOW_SECS};
use crate::domain::error::AppError;
use crate::domain::types::{Channel, ChannelId, LoopOutRequest, SwapQuote, SwapStatus};
use crate::infrastructure::network::{ChannelManager, SwapService};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

/// Excess of local balance over half the capacity, capped at `ceiling`.
/// Zero means no swap is needed.
pub fn swap_amount(local_balance: u64, capacity: u64, ceiling: u64) -> u64 {
    let raw = local_balance as i128 - (capacity / 2) as i128;
    if raw <= 0 {
        return 0;
    }
    (raw as u64).min(ceiling)
}

fn ppm_of(amount: u64, ppm: u64) -> u64 {
    ((amount as u128 * ppm as u128) / PPM_DENOMINATOR as u128) as u64
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SwapFeeLimits {
    pub max_swap_fee_sat: u64,
    pub max_swap_routing_fee_sat: u64,
    pub max_prepay_amt_sat: u64,
    pub max_prepay_routing_fee_sat: u64,
}

/// Ceilings scale with the swap amount; only the prepay is flat.
pub fn fee_limits(amount_sat: u64, policy: &PolicySettings) -> SwapFeeLimits {
    SwapFeeLimits {
        max_swap_fee_sat: ppm_of(amount_sat, policy.swap_fee_ppm),
        max_swap_routing_fee_sat: ppm_of(amount_sat, policy.swap_routing_fee_ppm) + 1,
        max_prepay_amt_sat: policy.max_prepay_sat,
        max_prepay_routing_fee_sat: ppm_of(policy.max_prepay_sat, policy.prepay_routing_fee_ppm)
            + 10,
    }
}

#[derive(Debug, Serialize)]
pub struct ChannelSwapPlan {
    pub channel_id: ChannelId,
    pub status: &'static str,
    pub amount_sat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<SwapQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_fee_sat: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelSwapPlan {
    fn failed(channel_id: ChannelId, err: &AppError) -> Self {
        Self {
            channel_id,
            status: "ERROR",
            amount_sat: 0,
            quote: None,
            total_fee_sat: None,
            message: None,
            error: Some(err.to_string()),
        }
    }
}

fn find_channel(channels: &[Channel], channel_id: ChannelId) -> Result<&Channel, AppError> {
    channels
        .iter()
        .find(|c| c.chan_id == channel_id)
        .ok_or_else(|| AppError::NotFound(format!("Channel {channel_id} not found.")))
}

/// Quotes each channel independently; a failing channel never fails the batch.
pub async fn quote_batch(
    lnd: &dyn ChannelManager,
    swap: &dyn SwapService,
    policy: &PolicySettings,
    channel_ids: &[ChannelId],
) -> Result<Vec<ChannelSwapPlan>, AppError> {
    let channels = lnd.list_channels().await?;
    let mut plans = Vec::with_capacity(channel_ids.len());
    for &channel_id in channel_ids {
        let channel = match find_channel(&channels, channel_id) {
            Ok(c) => c,
            Err(e) => {
                plans.push(ChannelSwapPlan::failed(channel_id, &e));
                continue;
            }
        };
        let amount = swap_amount(channel.local_balance, channel.capacity, policy.swap_ceiling_sat);
        if amount == 0 {
            plans.push(ChannelSwapPlan {
                channel_id,
                status: "OK",
                amount_sat: 0,
                quote: None,
                total_fee_sat: None,
                message: Some("Channel does not need a loop out.".to_string()),
                error: None,
            });
            continue;
        }
        match swap.quote_out(amount, policy.sweep_conf_target).await {
            Ok(quote) => {
                let total = quote
                    .swap_fee_sat
                    .saturating_add(quote.prepay_amt_sat)
                    .saturating_add(quote.htlc_sweep_fee_sat);
                plans.push(ChannelSwapPlan {
                    channel_id,
                    status: "OK",
                    amount_sat: amount,
                    quote: Some(quote),
                    total_fee_sat: Some(total),
                    message: None,
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(target: "loop", channel_id, error = %e, "loop out quote failed");
                let mut failed = ChannelSwapPlan::failed(channel_id, &e);
                failed.amount_sat = amount;
                plans.push(failed);
            }
        }
    }
    Ok(plans)
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopOutOutcome {
    Initiated {
        channel_id: ChannelId,
        swap_id: String,
        htlc_address: String,
        amount_sat: u64,
        limits: SwapFeeLimits,
        server_message: String,
    },
    AlreadyPending {
        channel_id: ChannelId,
        swap_id: String,
        message: String,
    },
    NotNeeded {
        channel_id: ChannelId,
        message: String,
    },
}

/// Unresolved swap whose outgoing set references `channel_id`.
pub fn pending_swap_for(swaps: &[SwapStatus], channel_id: ChannelId) -> Option<&SwapStatus> {
    swaps
        .iter()
        .find(|s| !s.state.is_resolved() && s.outgoing_chan_set.contains(&channel_id))
}

pub async fn initiate(
    lnd: &dyn ChannelManager,
    swap: &dyn SwapService,
    policy: &PolicySettings,
    channel_id: ChannelId,
) -> Result<LoopOutOutcome, AppError> {
    let in_flight = swap.list_swaps(0).await?;
    if let Some(pending) = pending_swap_for(&in_flight, channel_id) {
        tracing::info!(target: "loop", channel_id, swap_id = %pending.id, "loop out already pending");
        return Ok(LoopOutOutcome::AlreadyPending {
            channel_id,
            swap_id: pending.id.clone(),
            message: format!("Channel {channel_id} is already part of a pending Loop Out swap."),
        });
    }

    let channels = lnd.list_channels().await?;
    let channel = find_channel(&channels, channel_id)?;
    let amount = swap_amount(channel.local_balance, channel.capacity, policy.swap_ceiling_sat);
    if amount == 0 {
        return Ok(LoopOutOutcome::NotNeeded {
            channel_id,
            message: "Channel does not need a loop out.".to_string(),
        });
    }

    let limits = fee_limits(amount, policy);
    let request = LoopOutRequest {
        amount_sat: amount,
        outgoing_chan_set: vec![channel_id],
        sweep_conf_target: policy.sweep_conf_target,
        max_swap_fee_sat: limits.max_swap_fee_sat,
        max_prepay_amt_sat: limits.max_prepay_amt_sat,
        max_swap_routing_fee_sat: limits.max_swap_routing_fee_sat,
        max_prepay_routing_fee_sat: limits.max_prepay_routing_fee_sat,
    };
    let response = swap.loop_out(&request).await?;
    tracing::info!(
        target: "loop",
        channel_id,
        amount_sat = amount,
        swap_id = %response.id,
        "loop out initiated"
    );
    Ok(LoopOutOutcome::Initiated {
        channel_id,
        swap_id: response.id,
        htlc_address: response.htlc_address,
        amount_sat: amount,
        limits,
        server_message: response.server_message,
    })
}

/// Loop-out swaps started in the trailing day, newest first.
pub async fn recent_swaps(
    swap: &dyn SwapService,
    now: DateTime<Utc>,
) -> Result<Vec<SwapStatus>, AppError> {
    let since = now - ChronoDuration::seconds(SWAP_HISTORY_WINDOW_SECS as i64);
    let since_ns = since.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
    let mut swaps = swap.list_swaps(since_ns).await?;
    swaps.retain(|s| s.loop_out && s.initiation_time_ns >= since_ns);
    swaps.sort_by(|a, b| b.initiation_time_ns.cmp(&a.initiation_time_ns));
    swaps.truncate(SWAP_HISTORY_LIMIT);
    Ok(swaps)
}
