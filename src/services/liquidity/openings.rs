// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::PolicySettings;
use crate::domain::error::AppError;
use crate::domain::types::{ChannelAllocation, PendingOpen};
use crate::infrastructure::network::ChannelManager;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenOperation {
    Single {
        node_pubkey: String,
        local_funding_amount_sat: u64,
        #[serde(default)]
        sat_per_vbyte: Option<u64>,
    },
    Batch {
        channels: Vec<ChannelAllocation>,
        #[serde(default)]
        sat_per_vbyte: Option<u64>,
    },
}

impl OpenOperation {
    pub fn total_sat(&self) -> u64 {
        match self {
            OpenOperation::Single {
                local_funding_amount_sat,
                ..
            } => *local_funding_amount_sat,
            OpenOperation::Batch { channels, .. } => channels
                .iter()
                .map(|c| c.local_funding_amount_sat)
                .fold(0u64, u64::saturating_add),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpeningPlan {
    Planned(OpenOperation),
    Insufficient { available_sat: u64, required_sat: u64 },
}

/// A counterparty funded at a fixed amount when it is the only candidate.
#[derive(Clone, Copy, Debug)]
pub struct PremiumPeer<'a> {
    pub pubkey: &'a str,
    pub amount_sat: u64,
}

/// Splits `available_sat` evenly, dropping the lowest-ranked candidate until
/// each share reaches `min_channel_sat`.
pub fn plan_openings(
    candidates: &[String],
    available_sat: u64,
    min_channel_sat: u64,
    sat_per_vbyte: Option<u64>,
    premium: Option<PremiumPeer<'_>>,
) -> OpeningPlan {
    if let [only] = candidates
        && let Some(premium) = premium
        && only == premium.pubkey
    {
        if available_sat < premium.amount_sat {
            return OpeningPlan::Insufficient {
                available_sat,
                required_sat: premium.amount_sat,
            };
        }
        return OpeningPlan::Planned(OpenOperation::Single {
            node_pubkey: only.clone(),
            local_funding_amount_sat: premium.amount_sat,
            sat_per_vbyte,
        });
    }

    let mut count = candidates.len();
    while count > 0 && available_sat / (count as u64) < min_channel_sat {
        count -= 1;
    }
    if count == 0 {
        return OpeningPlan::Insufficient {
            available_sat,
            required_sat: min_channel_sat,
        };
    }

    let share = available_sat / count as u64;
    let survivors = &candidates[..count];
    if let [only] = survivors {
        return OpeningPlan::Planned(OpenOperation::Single {
            node_pubkey: only.clone(),
            local_funding_amount_sat: share,
            sat_per_vbyte,
        });
    }
    OpeningPlan::Planned(OpenOperation::Batch {
        channels: survivors
            .iter()
            .map(|pubkey| ChannelAllocation {
                node_pubkey: pubkey.clone(),
                local_funding_amount_sat: share,
            })
            .collect(),
        sat_per_vbyte,
    })
}

#[derive(Debug, Serialize)]
pub struct SkippedPeer {
    pub pub_key: String,
    pub reason: &'static str,
}

/// Keeps rank order. Removes blacklisted nodes, duplicates and existing peers.
pub fn filter_candidates(
    requested: &[String],
    blacklist: &[String],
    existing: &HashSet<String>,
) -> (Vec<String>, Vec<SkippedPeer>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    for pubkey in requested {
        let reason = if blacklist.iter().any(|b| b == pubkey) {
            Some("blacklisted")
        } else if existing.contains(pubkey) {
            Some("channel already exists")
        } else if !seen.insert(pubkey.as_str()) {
            Some("duplicate")
        } else {
            None
        };
        match reason {
            Some(reason) => skipped.push(SkippedPeer {
                pub_key: pubkey.clone(),
                reason,
            }),
            None => kept.push(pubkey.clone()),
        }
    }
    (kept, skipped)
}

/// Confirmed on-chain balance less the reserve.
pub async fn available_funds(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
) -> Result<u64, AppError> {
    let wallet = lnd.wallet_balance().await?;
    Ok(wallet
        .confirmed_balance
        .saturating_sub(policy.onchain_reserve_sat))
}

pub async fn ensure_budget(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    requested_sat: u64,
) -> Result<(), AppError> {
    let available = available_funds(lnd, policy).await?;
    if requested_sat > available {
        return Err(AppError::validation(
            "local_funding_amount_sat",
            format!(
                "requested {requested_sat} sat exceeds the {available} sat available after keeping a {} sat on-chain reserve",
                policy.onchain_reserve_sat
            ),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct OpeningProposal {
    pub status: &'static str,
    pub message: String,
    pub available_sat: u64,
    pub operations: Vec<OpenOperation>,
    pub skipped: Vec<SkippedPeer>,
}

pub async fn propose(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    blacklist: &[String],
    premium: PremiumPeer<'_>,
    requested: &[String],
    sat_per_vbyte: u64,
) -> Result<OpeningProposal, AppError> {
    let available = available_funds(lnd, policy).await?;
    let existing: HashSet<String> = lnd
        .list_channels()
        .await?
        .into_iter()
        .map(|c| c.remote_pubkey)
        .collect();
    let (kept, skipped) = filter_candidates(requested, blacklist, &existing);

    let plan = plan_openings(
        &kept,
        available,
        policy.min_channel_sat,
        Some(sat_per_vbyte),
        Some(premium),
    );
    let (message, operations) = match plan {
        OpeningPlan::Planned(op) => {
            let message = match &op {
                OpenOperation::Single {
                    local_funding_amount_sat,
                    ..
                } => format!("Proposed a single channel open of {local_funding_amount_sat} sat."),
                OpenOperation::Batch { channels, .. } => format!(
                    "Proposed a batch open of {} channels with {} sat each.",
                    channels.len(),
                    op.total_sat() / channels.len().max(1) as u64
                ),
            };
            (message, vec![op])
        }
        OpeningPlan::Insufficient {
            available_sat,
            required_sat,
        } => (
            format!(
                "Insufficient budget: {available_sat} sat available, at least {required_sat} sat needed per channel."
            ),
            Vec::new(),
        ),
    };
    tracing::info!(
        target: "liquidity",
        available,
        candidates = kept.len(),
        skipped = skipped.len(),
        planned = operations.len(),
        "channel openings proposed"
    );
    Ok(OpeningProposal {
        status: "OK",
        message,
        available_sat: available,
        operations,
        skipped,
    })
}

fn pending_json(pending: &PendingOpen) -> Value {
    json!({
        "funding_txid": pending.funding_txid,
        "output_index": pending.output_index,
        "channel_point": pending.channel_point(),
    })
}

/// Executes one operation after re-checking the budget.
pub async fn execute_operation(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    operation: &OpenOperation,
) -> Result<Value, AppError> {
    ensure_budget(lnd, policy, operation.total_sat()).await?;
    match operation {
        OpenOperation::Single {
            node_pubkey,
            local_funding_amount_sat,
            sat_per_vbyte,
        } => {
            let pending = lnd
                .open_channel(node_pubkey, *local_funding_amount_sat, *sat_per_vbyte)
                .await?;
            Ok(json!({ "status": "OK", "type": "single", "pending_channel": pending_json(&pending) }))
        }
        OpenOperation::Batch {
            channels,
            sat_per_vbyte,
        } => {
            if channels.is_empty() {
                return Err(AppError::validation("channels", "must not be empty"));
            }
            let pending = lnd.batch_open_channel(channels, *sat_per_vbyte).await?;
            Ok(json!({
                "status": "OK",
                "type": "batch",
                "pending_channels": pending.iter().map(pending_json).collect::<Vec<_>>(),
            }))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoopOpenAdvice {
    pub recommend: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pubkey: Option<String>,
    pub confirmed_onchain_sat: u64,
    pub inbound_sat: u64,
}

pub fn advise_loop_open(
    confirmed_sat: u64,
    inbound_sat: u64,
    policy: &PolicySettings,
    counterparty: &str,
) -> LoopOpenAdvice {
    let (recommend, message) = if confirmed_sat < policy.premium_min_onchain_sat {
        (
            false,
            format!(
                "Node has only {confirmed_sat} sats on-chain, which is not enough. The threshold is {} sats to open a {} sat channel to the LOOP node.",
                policy.premium_min_onchain_sat, policy.premium_channel_sat
            ),
        )
    } else if inbound_sat >= policy.premium_min_inbound_sat {
        (
            true,
            format!(
                "Node has {confirmed_sat} sats on-chain and {inbound_sat} sats of inbound liquidity. Opening a {} sat channel to the LOOP node is recommended.",
                policy.premium_channel_sat
            ),
        )
    } else {
        (
            false,
            format!(
                "Node has only {inbound_sat} sats of inbound liquidity, which is not enough. The threshold is {} sats.",
                policy.premium_min_inbound_sat
            ),
        )
    };
    LoopOpenAdvice {
        recommend,
        message,
        node_pubkey: recommend.then(|| counterparty.to_string()),
        confirmed_onchain_sat: confirmed_sat,
        inbound_sat,
    }
}

pub async fn should_open_to_loop(
    lnd: &dyn ChannelManager,
    policy: &PolicySettings,
    counterparty: &str,
) -> Result<LoopOpenAdvice, AppError> {
    let wallet = lnd.wallet_balance().await?;
    let balance = lnd.channel_balance().await?;
    Ok(advise_loop_open(
        wallet.confirmed_balance,
        balance.remote_balance_sat,
        policy,
        counterparty,
    ))
}
