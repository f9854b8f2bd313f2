// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::PolicySettings;
use crate::domain::constants::{MSAT_PER_SAT, PPM_DENOMINATOR};
use crate::domain::error::AppError;
use crate::domain::types::{Channel, ChannelId, RebalanceOpportunity};
use crate::infrastructure::network::ChannelManager;
use serde::Serialize;

/// Pairs every surplus channel with every deficit channel.
///
/// Surplus means an outbound share of at least `high_pct`, deficit at most
/// `low_pct`. Channels facing `excluded_pubkey` never act as the surplus side.
pub fn find_opportunities(
    channels: &[Channel],
    high_pct: u64,
    low_pct: u64,
    excluded_pubkey: &str,
) -> Vec<RebalanceOpportunity> {
    let high: Vec<&Channel> = channels
        .iter()
        .filter(|c| c.outbound_pct() >= high_pct as f64 && c.remote_pubkey != excluded_pubkey)
        .collect();
    let low: Vec<&Channel> = channels
        .iter()
        .filter(|c| c.outbound_pct() <= low_pct as f64)
        .collect();

    let mut opportunities = Vec::with_capacity(high.len() * low.len());
    for deficit in &low {
        for surplus in &high {
            if surplus.chan_id == deficit.chan_id {
                continue;
            }
            opportunities.push(RebalanceOpportunity {
                outgoing_channel_id: surplus.chan_id,
                incoming_channel_id: deficit.chan_id,
                description: format!(
                    "Rebalance from channel {} (high outbound) to channel {} (low outbound).",
                    surplus.chan_id, deficit.chan_id
                ),
            });
        }
    }
    opportunities
}

#[derive(Debug, Serialize)]
pub struct OpportunityReport {
    pub status: &'static str,
    pub message: String,
    pub opportunities: Vec<RebalanceOpportunity>,
}

pub fn report(channels: &[Channel], opportunities: Vec<RebalanceOpportunity>) -> OpportunityReport {
    let message = if channels.is_empty() {
        "No channels found.".to_string()
    } else if opportunities.is_empty() {
        "No rebalance opportunities found. Need at least one channel with low outbound liquidity and one with high outbound liquidity.".to_string()
    } else {
        format!("Found {} rebalance opportunities.", opportunities.len())
    };
    OpportunityReport {
        status: "OK",
        message,
        opportunities,
    }
}

#[derive(Debug, Serialize)]
pub struct RebalanceOutcome {
    pub status: String,
    pub amount_sats: u64,
    pub outgoing_channel_id: ChannelId,
    pub incoming_channel_id: ChannelId,
    pub fee_limit_msat: u64,
    pub route_fee_msat: u64,
    pub hops: usize,
    pub failure: Option<String>,
}

pub fn fee_limit_msat(amount_msat: u64, fee_limit_ppm: u64) -> u64 {
    ((amount_msat as u128 * fee_limit_ppm as u128) / PPM_DENOMINATOR as u128) as u64
}

/// Circular payment from `outgoing` back into `incoming`.
///
/// The amount is capped at `max_rebalance_sat`. The outgoing channel must not
/// face `swap_counterparty`.
pub async fn execute_rebalance(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    swap_counterparty: &str,
    outgoing: ChannelId,
    incoming: ChannelId,
    amount_sats: u64,
) -> Result<RebalanceOutcome, AppError> {
    if amount_sats == 0 {
        return Err(AppError::validation("amount_sats", "must be positive"));
    }
    if outgoing == incoming {
        return Err(AppError::validation(
            "incoming_channel_id",
            "must differ from outgoing_channel_id",
        ));
    }
    let amount_sats = amount_sats.min(policy.max_rebalance_sat);
    let amount_msat = amount_sats * MSAT_PER_SAT;

    let own_pubkey = lnd.node_info().await?.identity_pubkey;
    let outgoing_edge = lnd.channel_info(outgoing).await?;
    if outgoing_edge.counterparty(&own_pubkey) == swap_counterparty {
        return Err(AppError::validation(
            "outgoing_channel_id",
            "Cannot use a channel with the LOOP node as the outgoing channel for a rebalance.",
        ));
    }
    let incoming_edge = lnd.channel_info(incoming).await?;
    let last_hop = incoming_edge.counterparty(&own_pubkey).to_string();

    let fee_limit = fee_limit_msat(amount_msat, policy.rebalance_fee_limit_ppm);
    let Some(route) = lnd
        .query_route(&own_pubkey, amount_msat, outgoing, &last_hop, fee_limit)
        .await?
    else {
        return Err(AppError::NotFound("Could not find a route.".to_string()));
    };

    let invoice = lnd
        .add_invoice(amount_msat, &format!("Rebalance of {amount_sats} sats."))
        .await?;
    let attempt = lnd
        .send_to_route(&invoice.r_hash, &invoice.payment_addr, amount_msat, &route)
        .await?;

    tracing::info!(
        target: "liquidity",
        outgoing,
        incoming,
        amount_sats,
        fee_msat = route.total_fees_msat,
        status = %attempt.status,
        "rebalance attempted"
    );
    Ok(RebalanceOutcome {
        status: attempt.status,
        amount_sats,
        outgoing_channel_id: outgoing,
        incoming_channel_id: incoming,
        fee_limit_msat: fee_limit,
        route_fee_msat: route.total_fees_msat,
        hops: route.hop_count,
        failure: attempt.failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::LOOP_NODE_PUBKEY;

    fn channel(id: ChannelId, pubkey: &str, local: u64, remote: u64) -> Channel {
        Channel {
            chan_id: id,
            remote_pubkey: pubkey.to_string(),
            channel_point: format!("tx{id}:0"),
            capacity: local + remote,
            local_balance: local,
            remote_balance: remote,
            lifetime_secs: 0,
            active: true,
            peer_alias: None,
        }
    }

    #[test]
    fn pairs_surplus_with_deficit() {
        let channels = vec![
            channel(1, "a", 900, 100),
            channel(2, "b", 100, 900),
            channel(3, "c", 800, 200),
            channel(4, "d", 500, 500),
        ];
        let found = find_opportunities(&channels, 75, 25, LOOP_NODE_PUBKEY);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|o| o.incoming_channel_id == 2));
        assert_eq!(
            found[0].description,
            "Rebalance from channel 1 (high outbound) to channel 2 (low outbound)."
        );
    }

    #[test]
    fn swap_counterparty_is_never_the_surplus_side() {
        let channels = vec![
            channel(1, LOOP_NODE_PUBKEY, 1_000, 0),
            channel(2, "b", 0, 1_000),
        ];
        assert!(find_opportunities(&channels, 75, 25, LOOP_NODE_PUBKEY).is_empty());
    }

    #[test]
    fn boundaries_are_inclusive_and_self_pairs_impossible() {
        let channels = vec![channel(1, "a", 750, 250), channel(2, "b", 250, 750)];
        let found = find_opportunities(&channels, 75, 25, LOOP_NODE_PUBKEY);
        assert_eq!(found.len(), 1);

        // Degenerate thresholds would classify one channel on both sides.
        let odd = vec![channel(5, "e", 500, 500)];
        let none = find_opportunities(&odd, 50, 50, LOOP_NODE_PUBKEY);
        assert!(none.iter().all(|o| o.outgoing_channel_id != o.incoming_channel_id));
        assert!(none.is_empty());
    }

    #[test]
    fn empty_inputs_report_no_action() {
        let r = report(&[], Vec::new());
        assert_eq!(r.message, "No channels found.");
        let channels = vec![channel(1, "a", 500, 500)];
        let r = report(&channels, Vec::new());
        assert!(r.message.starts_with("No rebalance opportunities found."));
    }

    #[test]
    fn fee_limit_is_ppm_of_amount() {
        assert_eq!(fee_limit_msat(20_000_000, 4_000), 80_000);
        assert_eq!(fee_limit_msat(0, 4_000), 0);
    }
}
