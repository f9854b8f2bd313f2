// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::PolicySettings;
use crate::domain::constants::SECS_PER_DAY;
use crate::domain::error::AppError;
use crate::domain::types::{Channel, ChannelId, ForwardingEvent};
use crate::infrastructure::network::ChannelManager;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct CloseCandidate {
    pub alias: String,
    pub chan_id: ChannelId,
    pub channel_point: String,
    pub capacity_sats: u64,
    pub routed_volume_msat: u64,
    pub age_days: u64,
}

/// Channels older than `min_age_days` in the lowest routed-volume slice:
/// the `len / divisor + 1` quietest are selected.
pub fn select_close_candidates<'a>(
    channels: &'a [Channel],
    events: &[ForwardingEvent],
    min_age_days: u64,
    divisor: usize,
) -> Vec<(&'a Channel, u64)> {
    let mut routed: HashMap<ChannelId, u64> = HashMap::new();
    for event in events {
        let entry = routed.entry(event.chan_id_out).or_default();
        *entry = entry.saturating_add(event.amt_out_msat);
    }

    let mut candidates: Vec<(&Channel, u64)> = channels
        .iter()
        .filter(|c| c.age_days() > min_age_days)
        .map(|c| (c, routed.get(&c.chan_id).copied().unwrap_or(0)))
        .collect();
    if candidates.is_empty() {
        return candidates;
    }
    candidates.sort_by(|(a, va), (b, vb)| va.cmp(vb).then_with(|| a.chan_id.cmp(&b.chan_id)));
    let keep = candidates.len() / divisor.max(1) + 1;
    candidates.truncate(keep);
    candidates
}

#[derive(Debug, Serialize)]
pub struct CloseProposal {
    pub status: &'static str,
    pub message: String,
    pub candidates: Vec<CloseCandidate>,
}

pub async fn propose(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
) -> Result<CloseProposal, AppError> {
    let events = lnd
        .forwarding_history(Duration::from_secs(policy.close_window_days * SECS_PER_DAY))
        .await?;
    let channels = lnd.list_channels().await?;
    let selected = select_close_candidates(
        &channels,
        &events,
        policy.close_min_age_days,
        policy.close_percentile_divisor,
    );
    if selected.is_empty() {
        return Ok(CloseProposal {
            status: "OK",
            message: format!(
                "No channels older than {} days found.",
                policy.close_min_age_days
            ),
            candidates: Vec::new(),
        });
    }

    let mut candidates = Vec::with_capacity(selected.len());
    for (channel, volume) in selected {
        let alias = match lnd.node_alias(&channel.remote_pubkey).await {
            Ok(Some(alias)) => alias,
            Ok(None) => "Unknown".to_string(),
            Err(e) => {
                tracing::debug!(target: "liquidity", pubkey = %channel.remote_pubkey, error = %e, "alias lookup failed");
                "Unknown".to_string()
            }
        };
        candidates.push(CloseCandidate {
            alias,
            chan_id: channel.chan_id,
            channel_point: channel.channel_point.clone(),
            capacity_sats: channel.capacity,
            routed_volume_msat: volume,
            age_days: channel.age_days(),
        });
    }
    Ok(CloseProposal {
        status: "PROPOSED",
        message: "Found channels that could be closed to reclaim liquidity.".to_string(),
        candidates,
    })
}
