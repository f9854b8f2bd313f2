// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod common;

use channel_steward::domain::types::{SwapState, SwapStatus};
use channel_steward::services::agent::confirm::{AutoApprove, AutoDeny};
use channel_steward::services::metrics::AgentStats;
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn unknown_action_is_reported_and_batch_continues() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(1, 600_000, 400_000)]));
    let stats = Arc::new(AgentStats::default());
    let dispatcher = dispatcher(
        lnd,
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        stats.clone(),
    );

    let results = dispatcher
        .execute_batch(&[
            request("c1", "search_documentation", json!({})),
            request("c2", "get_node_info", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error_kind(), Some("unknown_action"));
    assert_eq!(
        results[0].output["error"],
        "Unknown function requested by model: search_documentation"
    );
    assert!(!results[1].is_error());
    assert_eq!(results[1].call_id.as_deref(), Some("c2"));
    assert_eq!(results[1].output["identity_pubkey"], OWN_PUBKEY);
    assert_eq!(stats.actions_failed.load(Ordering::Relaxed), 1);
    assert_eq!(stats.actions_executed.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn denied_sensitive_action_never_reaches_the_node() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(7, 600_000, 400_000)]));
    let stats = Arc::new(AgentStats::default());
    let dispatcher = dispatcher(
        lnd.clone(),
        Arc::new(FakeSwap::default()),
        Box::new(AutoDeny),
        dispatch_settings(),
        stats.clone(),
    );

    let result = dispatcher
        .execute(&request(
            "c1",
            "open_channel",
            json!({ "node_pubkey": "02peer", "local_funding_amount_sat": 5_000_000 }),
        ))
        .await;

    assert_eq!(result.error_kind(), Some("denied"));
    assert_eq!(
        result.output["error"],
        "User denied execution of tool: open_channel"
    );
    assert!(lnd.recorded().is_empty());
    assert_eq!(stats.actions_denied.load(Ordering::Relaxed), 1);

    // Read-only actions are not gated.
    let read = dispatcher
        .execute(&request("c2", "list_channels", json!({})))
        .await;
    assert!(!read.is_error());
}

#[tokio::test]
async fn invalid_arguments_skip_the_collaborator() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(7, 600_000, 400_000)]));
    let dispatcher = dispatcher(
        lnd.clone(),
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let negative = dispatcher
        .execute(&request(
            "c1",
            "open_channel",
            json!({ "node_pubkey": "02peer", "local_funding_amount_sat": -5 }),
        ))
        .await;
    assert_eq!(negative.error_kind(), Some("validation"));

    let missing = dispatcher
        .execute(&request("c2", "set_fee_policy", json!({ "channel_id": "7" })))
        .await;
    assert_eq!(missing.error_kind(), Some("validation"));

    let not_numeric = dispatcher
        .execute(&request(
            "c3",
            "close_channel",
            json!({ "channel_id": "seven" }),
        ))
        .await;
    assert_eq!(not_numeric.error_kind(), Some("validation"));

    assert!(lnd.recorded().is_empty());
}

#[tokio::test]
async fn approved_fee_update_uses_the_channel_point() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(7, 600_000, 400_000)]));
    let dispatcher = dispatcher(
        lnd.clone(),
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let result = dispatcher
        .execute(&request(
            "c1",
            "set_fee_policy",
            json!({ "channel_id": "7", "fee_rate": "250" }),
        ))
        .await;

    assert!(!result.is_error(), "{:?}", result.output);
    assert_eq!(result.output["previous_fee_rate_ppm"], 100);
    assert_eq!(result.output["base_fee_msat"], 1_000);
    assert_eq!(
        lnd.recorded(),
        vec![format!("set_fee_policy:{:064x}:0:250", 7)]
    );
}

#[tokio::test]
async fn oversized_batch_is_replaced_by_one_guidance_result() {
    let channels = (1..=5).map(|id| channel(id, 600_000, 400_000)).collect();
    let lnd = Arc::new(FakeLnd::with_channels(channels));
    let stats = Arc::new(AgentStats::default());
    let mut settings = dispatch_settings();
    settings.max_payload_chars = 200;
    let dispatcher = dispatcher(
        lnd,
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        settings,
        stats.clone(),
    );

    let results = dispatcher
        .execute_batch(&[
            request("c1", "list_channels", json!({})),
            request("c2", "get_wallet_balance", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].call_id.is_none());
    assert_eq!(results[0].error_kind(), Some("payload_too_large"));
    let message = results[0].output["error"].as_str().unwrap_or_default();
    assert!(message.contains("The maximum is 200"));
    assert_eq!(stats.payload_rejections.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn loop_out_quotes_isolate_failing_channels() {
    // Channel 3 needs a 100k swap, which the fake refuses to quote.
    let lnd = Arc::new(FakeLnd::with_channels(vec![
        channel(1, 900_000, 100_000),
        channel(3, 600_000, 400_000),
        channel(4, 300_000, 700_000),
    ]));
    let swap = Arc::new(FakeSwap {
        failing_amount: Some(100_000),
        ..FakeSwap::default()
    });
    let dispatcher = dispatcher(
        lnd,
        swap,
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let result = dispatcher
        .execute(&request(
            "c1",
            "calculate_and_quote_loop_outs",
            json!({ "channel_ids": ["1", "99", "3", "4"] }),
        ))
        .await;

    assert!(!result.is_error(), "{:?}", result.output);
    let quotes = result.output["quotes"].as_array().cloned().unwrap_or_default();
    assert_eq!(quotes.len(), 4);
    assert_eq!(quotes[0]["status"], "OK");
    assert_eq!(quotes[0]["amount_sat"], 400_000);
    assert_eq!(quotes[0]["total_fee_sat"], 400 + 1_337 + 500);
    assert_eq!(quotes[1]["status"], "ERROR");
    assert_eq!(quotes[2]["status"], "ERROR");
    assert_eq!(quotes[2]["amount_sat"], 100_000);
    assert_eq!(quotes[3]["status"], "OK");
    assert_eq!(quotes[3]["amount_sat"], 0);
}

#[tokio::test]
async fn pending_swap_blocks_a_second_loop_out() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(1, 900_000, 100_000)]));
    let swap = Arc::new(FakeSwap {
        swaps: vec![SwapStatus {
            id: "in-flight".into(),
            state: SwapState::HtlcPublished,
            amount_sat: 400_000,
            initiation_time_ns: 1,
            outgoing_chan_set: vec![1],
            loop_out: true,
        }],
        ..FakeSwap::default()
    });
    let dispatcher = dispatcher(
        lnd,
        swap.clone(),
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let result = dispatcher
        .execute(&request("c1", "initiate_loop_out", json!({ "channel_id": "1" })))
        .await;

    assert_eq!(result.output["status"], "ALREADY_PENDING");
    assert_eq!(result.output["swap_id"], "in-flight");
    assert_eq!(swap.loop_out_count(), 0);
}

#[tokio::test]
async fn loop_out_targets_half_capacity_with_scaled_limits() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(1, 8_000_000, 2_000_000)]));
    let swap = Arc::new(FakeSwap::default());
    let dispatcher = dispatcher(
        lnd,
        swap.clone(),
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let result = dispatcher
        .execute(&request("c1", "initiate_loop_out", json!({ "channel_id": 1 })))
        .await;

    assert_eq!(result.output["status"], "INITIATED", "{:?}", result.output);
    assert_eq!(result.output["amount_sat"], 3_000_000);
    let sent = swap.loop_outs.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].outgoing_chan_set, vec![1]);
    assert_eq!(sent[0].max_swap_fee_sat, 6_300);
    assert_eq!(sent[0].max_prepay_amt_sat, 30_000);
}

#[tokio::test]
async fn rebalance_never_routes_out_through_the_swap_counterparty() {
    let mut swap_channel = channel(1, 900_000, 100_000);
    swap_channel.remote_pubkey = SWAP_PUBKEY.into();
    let lnd = Arc::new(FakeLnd::with_channels(vec![
        swap_channel,
        channel(2, 850_000, 150_000),
        channel(3, 100_000, 900_000),
    ]));
    let dispatcher = dispatcher(
        lnd,
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let result = dispatcher
        .execute(&request("c1", "find_rebalance_opportunities", json!({})))
        .await;

    assert!(!result.is_error(), "{:?}", result.output);
    let text = result.output.to_string();
    assert!(text.contains("Rebalance from channel 2 (high outbound) to channel 3 (low outbound)."));
    assert!(!text.contains("Rebalance from channel 1 "));
}

#[tokio::test]
async fn unreadable_arguments_fail_only_their_own_call() {
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(1, 600_000, 400_000)]));
    let stats = Arc::new(AgentStats::default());
    let dispatcher = dispatcher(
        lnd.clone(),
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        stats.clone(),
    );
    let mut malformed = request("c2", "set_fee_policy", json!({}));
    malformed.arg_error = Some("invalid json: key must be a string at line 1 column 19".into());

    let results = dispatcher
        .execute_batch(&[
            request("c1", "get_wallet_balance", json!({})),
            malformed,
            request("c3", "get_node_info", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(!results[0].is_error());
    assert_eq!(results[1].call_id.as_deref(), Some("c2"));
    assert_eq!(results[1].error_kind(), Some("validation"));
    assert!(!results[2].is_error());
    assert!(lnd.recorded().is_empty());
    assert_eq!(stats.actions_failed.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_collaborator_times_out_without_blocking_the_batch() {
    let swap = Arc::new(FakeSwap {
        listing: Listing::Hang,
        ..FakeSwap::default()
    });
    let dispatcher = dispatcher(
        Arc::new(FakeLnd::default()),
        swap,
        Box::new(AutoApprove),
        dispatch_settings(),
        Arc::new(AgentStats::default()),
    );

    let results = dispatcher
        .execute_batch(&[
            request("c1", "list_loop_out_swaps", json!({})),
            request("c2", "get_node_info", json!({})),
        ])
        .await;

    assert_eq!(results[0].error_kind(), Some("timeout"));
    let message = results[0].output["error"].as_str().unwrap_or_default();
    assert!(message.contains("list_loop_out_swaps"), "{message}");
    assert!(message.contains("5000"), "{message}");
    assert!(!results[1].is_error());
    assert_eq!(results[1].output["identity_pubkey"], OWN_PUBKEY);
}

#[tokio::test]
async fn collaborator_failure_is_reported_and_later_actions_run() {
    let swap = Arc::new(FakeSwap {
        listing: Listing::Fail,
        ..FakeSwap::default()
    });
    let stats = Arc::new(AgentStats::default());
    let dispatcher = dispatcher(
        Arc::new(FakeLnd::default()),
        swap,
        Box::new(AutoApprove),
        dispatch_settings(),
        stats.clone(),
    );

    let results = dispatcher
        .execute_batch(&[
            request("c1", "list_loop_out_swaps", json!({})),
            request("c2", "get_wallet_balance", json!({})),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error_kind(), Some("collaborator"));
    let message = results[0].output["error"].as_str().unwrap_or_default();
    assert!(message.contains("daemon unavailable"), "{message}");
    assert!(!results[1].is_error());
    assert_eq!(stats.actions_failed.load(Ordering::Relaxed), 1);
    assert_eq!(stats.actions_executed.load(Ordering::Relaxed), 1);
}
