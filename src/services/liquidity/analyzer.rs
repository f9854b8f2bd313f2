// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::SECS_PER_DAY;
use crate::domain::error::AppError;
use crate::domain::types::{Channel, ChannelId, ForwardingEvent, LiquidityClassification, LiquidityTrend};
use crate::infrastructure::network::ChannelManager;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowTotals {
    pub inbound_msat: u64,
    pub outbound_msat: u64,
    pub last_forward_at: Option<u64>,
}

/// An event credits the inbound bucket of its incoming channel and the
/// outbound bucket of its outgoing channel.
pub fn aggregate_flows(events: &[ForwardingEvent]) -> HashMap<ChannelId, FlowTotals> {
    let mut flows: HashMap<ChannelId, FlowTotals> = HashMap::new();
    for event in events {
        if event.chan_id_in != 0 {
            let entry = flows.entry(event.chan_id_in).or_default();
            entry.inbound_msat = entry.inbound_msat.saturating_add(event.amt_in_msat);
            entry.last_forward_at = entry.last_forward_at.max(Some(event.timestamp));
        }
        if event.chan_id_out != 0 {
            let entry = flows.entry(event.chan_id_out).or_default();
            entry.outbound_msat = entry.outbound_msat.saturating_add(event.amt_out_msat);
            entry.last_forward_at = entry.last_forward_at.max(Some(event.timestamp));
        }
    }
    flows
}

/// `tolerance_pct` widens the balanced band: 10 means one side must exceed
/// the other by more than 10% to count as a trend.
pub fn classify_trend(inbound_msat: u64, outbound_msat: u64, tolerance_pct: u64) -> LiquidityTrend {
    let inbound = inbound_msat as u128;
    let outbound = outbound_msat as u128;
    let band = 100 + tolerance_pct as u128;
    if inbound * 100 > outbound * band {
        LiquidityTrend::Inbound
    } else if outbound * 100 > inbound * band {
        LiquidityTrend::Outbound
    } else if inbound > 0 || outbound > 0 {
        LiquidityTrend::Balanced
    } else {
        LiquidityTrend::Stagnant
    }
}

/// One record per channel, in channel order.
pub fn analyze(
    channels: &[Channel],
    events: &[ForwardingEvent],
    tolerance_pct: u64,
) -> Vec<LiquidityClassification> {
    let flows = aggregate_flows(events);
    channels
        .iter()
        .map(|channel| {
            if channel.local_balance.saturating_add(channel.remote_balance) > channel.capacity {
                tracing::warn!(
                    target: "liquidity",
                    chan_id = channel.chan_id,
                    "reported balances exceed capacity"
                );
            }
            let flow = flows.get(&channel.chan_id).copied().unwrap_or_default();
            LiquidityClassification {
                channel_id: channel.chan_id,
                peer_alias: channel
                    .peer_alias
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
                remote_pubkey: channel.remote_pubkey.clone(),
                balance_ratio: channel.balance_ratio(),
                liquidity_trend: classify_trend(flow.inbound_msat, flow.outbound_msat, tolerance_pct),
                inbound_msat: flow.inbound_msat,
                outbound_msat: flow.outbound_msat,
                last_forward_at: flow.last_forward_at,
            }
        })
        .collect()
}

/// Fetches channels and the trailing forwarding window, then classifies.
pub async fn analyze_node(
    lnd: &dyn ChannelManager,
    window_days: u64,
    tolerance_pct: u64,
) -> Result<Vec<LiquidityClassification>, AppError> {
    let events = lnd
        .forwarding_history(Duration::from_secs(window_days * SECS_PER_DAY))
        .await?;
    let channels = lnd.list_channels().await?;
    let analysis = analyze(&channels, &events, tolerance_pct);
    tracing::info!(
        target: "liquidity",
        channels = analysis.len(),
        events = events.len(),
        "channel liquidity classified"
    );
    Ok(analysis)
}
