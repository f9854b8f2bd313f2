// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod common;

use channel_steward::domain::conversation::{ConversationEntry, PlannerReply};
use channel_steward::domain::error::AppError;
use channel_steward::services::agent::confirm::AutoApprove;
use channel_steward::services::agent::control::line_source;
use channel_steward::services::agent::safety::SafetyGuard;
use channel_steward::services::agent::session::Session;
use channel_steward::services::agent::state_machine::AgentState;
use channel_steward::services::agent::{LoopSettings, Orchestrator, TickOutcome};
use channel_steward::services::metrics::AgentStats;
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn loop_settings(max_rounds: usize) -> LoopSettings {
    LoopSettings {
        system_prompt: "manage the node".into(),
        tick_interval: Duration::from_secs(1),
        planner_timeout: Duration::from_secs(5),
        max_rounds_per_tick: max_rounds,
        run_once: true,
    }
}

fn orchestrator(
    planner: Arc<ScriptedPlanner>,
    lnd: Arc<FakeLnd>,
    stats: Arc<AgentStats>,
    max_rounds: usize,
    shutdown: CancellationToken,
) -> Orchestrator {
    let (_tx, rx) = mpsc::channel(1);
    let dispatcher = dispatcher(
        lnd,
        Arc::new(FakeSwap::default()),
        Box::new(AutoApprove),
        dispatch_settings(),
        stats.clone(),
    );
    Orchestrator::new(
        planner,
        dispatcher,
        Session::new(50, stats.clone()),
        SafetyGuard::new(3, Duration::from_secs(60)),
        line_source(rx),
        shutdown,
        stats,
        loop_settings(max_rounds),
    )
}

fn reply_with(call_id: &str, name: &str, tokens: u64) -> Result<PlannerReply, AppError> {
    Ok(PlannerReply {
        text: Some(format!("calling {name}")),
        actions: vec![request(call_id, name, json!({}))],
        usage_tokens: tokens,
    })
}

fn final_reply(tokens: u64) -> Result<PlannerReply, AppError> {
    Ok(PlannerReply {
        text: Some("All channels look healthy.".into()),
        actions: Vec::new(),
        usage_tokens: tokens,
    })
}

#[tokio::test]
async fn tick_feeds_results_back_until_planner_is_done() {
    let planner = Arc::new(ScriptedPlanner::new(vec![
        reply_with("c1", "get_node_info", 120),
        reply_with("c2", "list_channels", 80),
        final_reply(50),
    ]));
    let stats = Arc::new(AgentStats::default());
    let lnd = Arc::new(FakeLnd::with_channels(vec![channel(1, 500_000, 500_000)]));
    let mut agent = orchestrator(
        planner.clone(),
        lnd,
        stats.clone(),
        10,
        CancellationToken::new(),
    );

    let outcome = agent.run_tick("check the node").await.unwrap();
    assert!(matches!(
        outcome,
        TickOutcome::Completed {
            rounds: 3,
            round_limit_hit: false
        }
    ));
    assert_eq!(agent.state(), AgentState::Idle);

    let history = agent.session().history();
    assert_eq!(history.len(), 6);
    assert!(history[0].is_user());
    match &history[2] {
        ConversationEntry::ActionResults { results } => {
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].call_id.as_deref(), Some("c1"));
        }
        other => panic!("expected action results, got {other:?}"),
    }
    // Each round sees the results of the previous one.
    let seen = planner
        .seen_history_lens
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    assert_eq!(seen, vec![1, 3, 5]);
    assert_eq!(agent.session().total_tokens(), 250);
    assert_eq!(stats.actions_executed.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn round_limit_ends_a_runaway_tick() {
    let planner = Arc::new(ScriptedPlanner::new(vec![
        reply_with("c1", "get_node_info", 1),
        reply_with("c2", "get_node_info", 1),
        reply_with("c3", "get_node_info", 1),
    ]));
    let mut agent = orchestrator(
        planner,
        Arc::new(FakeLnd::default()),
        Arc::new(AgentStats::default()),
        2,
        CancellationToken::new(),
    );

    let outcome = agent.run_tick("loop forever").await.unwrap();
    assert!(matches!(
        outcome,
        TickOutcome::Completed {
            rounds: 2,
            round_limit_hit: true
        }
    ));
    assert_eq!(agent.state(), AgentState::Idle);
}

#[tokio::test]
async fn transient_planner_failure_abandons_only_the_tick() {
    let planner = Arc::new(ScriptedPlanner::new(vec![
        Err(AppError::Planner {
            message: "503 Service Unavailable".into(),
            recoverable: true,
        }),
        final_reply(10),
    ]));
    let stats = Arc::new(AgentStats::default());
    let mut agent = orchestrator(
        planner,
        Arc::new(FakeLnd::default()),
        stats.clone(),
        5,
        CancellationToken::new(),
    );

    let first = agent.run_tick("status").await.unwrap();
    assert!(matches!(first, TickOutcome::Abandoned(AppError::Planner { .. })));
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(stats.ticks_abandoned.load(Ordering::Relaxed), 1);

    let second = agent.run_tick("status").await.unwrap();
    assert!(matches!(second, TickOutcome::Completed { rounds: 1, .. }));
}

#[tokio::test]
async fn rejected_credentials_stop_the_agent() {
    let planner = Arc::new(ScriptedPlanner::new(vec![Err(AppError::Planner {
        message: "401 Unauthorized".into(),
        recoverable: false,
    })]));
    let mut agent = orchestrator(
        planner,
        Arc::new(FakeLnd::default()),
        Arc::new(AgentStats::default()),
        5,
        CancellationToken::new(),
    );

    let tokens = agent.run("start").await.unwrap();
    assert_eq!(tokens, 0);
    assert_eq!(agent.state(), AgentState::Stopped);
}

#[tokio::test]
async fn cancelled_agent_stops_before_planning() {
    let planner = Arc::new(ScriptedPlanner::new(vec![final_reply(10)]));
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let mut agent = orchestrator(
        planner.clone(),
        Arc::new(FakeLnd::default()),
        Arc::new(AgentStats::default()),
        5,
        shutdown,
    );

    let tokens = agent.run("start").await.unwrap();
    assert_eq!(tokens, 0);
    assert_eq!(agent.state(), AgentState::Stopped);
    assert!(
        planner
            .seen_history_lens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    );
}

#[tokio::test]
async fn single_run_reports_cumulative_tokens() {
    let planner = Arc::new(ScriptedPlanner::new(vec![
        reply_with("c1", "get_wallet_balance", 300),
        final_reply(200),
    ]));
    let mut agent = orchestrator(
        planner,
        Arc::new(FakeLnd::default()),
        Arc::new(AgentStats::default()),
        5,
        CancellationToken::new(),
    );

    let tokens = agent.run("start").await.unwrap();
    assert_eq!(tokens, 500);
    assert_eq!(agent.state(), AgentState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stalled_planner_abandons_the_tick_and_the_next_one_runs() {
    let planner = Arc::new(ScriptedPlanner::stalling(1, vec![final_reply(10)]));
    let stats = Arc::new(AgentStats::default());
    let mut agent = orchestrator(
        planner,
        Arc::new(FakeLnd::default()),
        stats.clone(),
        5,
        CancellationToken::new(),
    );

    let first = agent.run_tick("status").await.unwrap();
    match first {
        TickOutcome::Abandoned(AppError::Timeout { operation, after_ms }) => {
            assert_eq!(operation, "planner");
            assert_eq!(after_ms, 5_000);
        }
        other => panic!("expected planner timeout, got {other:?}"),
    }
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(stats.ticks_abandoned.load(Ordering::Relaxed), 1);

    let second = agent.run_tick("status").await.unwrap();
    assert!(matches!(second, TickOutcome::Completed { rounds: 1, .. }));
}

#[tokio::test]
async fn unreadable_call_is_answered_while_its_sibling_runs() {
    let mut malformed = request("c2", "set_fee_policy", json!({}));
    malformed.arg_error = Some("invalid json: EOF while parsing an object".into());
    let planner = Arc::new(ScriptedPlanner::new(vec![
        Ok(PlannerReply {
            text: None,
            actions: vec![request("c1", "get_wallet_balance", json!({})), malformed],
            usage_tokens: 40,
        }),
        final_reply(10),
    ]));
    let lnd = Arc::new(FakeLnd::default());
    let mut agent = orchestrator(
        planner,
        lnd.clone(),
        Arc::new(AgentStats::default()),
        5,
        CancellationToken::new(),
    );

    let outcome = agent.run_tick("adjust fees").await.unwrap();
    assert!(matches!(outcome, TickOutcome::Completed { rounds: 2, .. }));
    match &agent.session().history()[2] {
        ConversationEntry::ActionResults { results } => {
            assert_eq!(results.len(), 2);
            assert!(!results[0].is_error());
            assert_eq!(results[1].error_kind(), Some("validation"));
        }
        other => panic!("expected action results, got {other:?}"),
    }
    assert!(lnd.recorded().is_empty());
}
