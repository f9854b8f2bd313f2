// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::GlobalSettings;
use crate::common::retry::with_timeout;
use crate::domain::conversation::ToolDeclaration;
use crate::domain::error::AppError;
use crate::infrastructure::network::Planner;
use crate::services::agent::catalog::tool_declarations;
use crate::services::agent::control::{ControlSignal, LineSource, next_signal};
use crate::services::agent::dispatcher::ActionDispatcher;
use crate::services::agent::prompt::{DEFAULT_INSTRUCTION, system_prompt};
use crate::services::agent::safety::SafetyGuard;
use crate::services::agent::session::Session;
use crate::services::agent::state_machine::{AgentEvent, AgentState, transition};
use crate::services::metrics::AgentStats;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub system_prompt: String,
    pub tick_interval: Duration,
    pub planner_timeout: Duration,
    pub max_rounds_per_tick: usize,
    pub run_once: bool,
}

impl LoopSettings {
    pub fn from_settings(settings: &GlobalSettings, run_once: bool) -> Self {
        Self {
            system_prompt: system_prompt(&settings.network, &settings.policy),
            tick_interval: settings.tick_interval(),
            planner_timeout: settings.planner_timeout(),
            max_rounds_per_tick: settings.max_rounds_per_tick,
            run_once,
        }
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The planner stopped requesting actions, or the round limit was reached.
    Completed { rounds: usize, round_limit_hit: bool },
    /// Planner failure or timeout; the loop continues at the next tick.
    Abandoned(AppError),
    /// Circuit breaker open.
    Skipped,
    Stopped,
}

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    dispatcher: ActionDispatcher,
    session: Session,
    safety: SafetyGuard,
    tools: Vec<ToolDeclaration>,
    lines: LineSource,
    shutdown: CancellationToken,
    stats: Arc<AgentStats>,
    settings: LoopSettings,
    state: AgentState,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planner: Arc<dyn Planner>,
        dispatcher: ActionDispatcher,
        session: Session,
        safety: SafetyGuard,
        lines: LineSource,
        shutdown: CancellationToken,
        stats: Arc<AgentStats>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            planner,
            dispatcher,
            session,
            safety,
            tools: tool_declarations(),
            lines,
            shutdown,
            stats,
            settings,
            state: AgentState::Idle,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn advance(&mut self, event: AgentEvent) -> Result<(), AppError> {
        self.state = transition(self.state, event)?;
        Ok(())
    }

    /// Runs ticks until an exit token, an interrupt or an unrecoverable planner
    /// failure. Returns the cumulative token usage.
    pub async fn run(&mut self, first_instruction: &str) -> Result<u64, AppError> {
        let mut instruction = first_instruction.to_string();
        loop {
            if self.shutdown.is_cancelled() {
                self.advance(AgentEvent::StopRequested)?;
                break;
            }
            match self.run_tick(&instruction).await? {
                TickOutcome::Completed {
                    rounds,
                    round_limit_hit,
                } => {
                    tracing::info!(
                        target: "agent",
                        rounds,
                        round_limit_hit,
                        total_tokens = self.session.total_tokens(),
                        "tick completed"
                    );
                }
                TickOutcome::Abandoned(e) => {
                    tracing::warn!(target: "agent", kind = e.kind(), error = %e, "tick abandoned; waiting for next tick");
                }
                TickOutcome::Skipped => {}
                TickOutcome::Stopped => break,
            }
            if self.state == AgentState::Stopped || self.settings.run_once {
                break;
            }

            tracing::info!(
                target: "agent",
                wait_secs = self.settings.tick_interval.as_secs(),
                "waiting for instruction (type 'exit' or 'quit' to stop)"
            );
            match next_signal(
                &self.lines,
                self.settings.tick_interval,
                DEFAULT_INSTRUCTION,
                &self.shutdown,
            )
            .await
            {
                ControlSignal::Stop => {
                    self.advance(AgentEvent::StopRequested)?;
                    break;
                }
                ControlSignal::Instruction(next) => instruction = next,
            }
        }
        Ok(self.session.total_tokens())
    }

    /// One tick: plan, execute, feed back, until the planner has nothing left to do.
    pub async fn run_tick(&mut self, instruction: &str) -> Result<TickOutcome, AppError> {
        if let Err(e) = self.safety.check() {
            AgentStats::incr(&self.stats.ticks_abandoned);
            tracing::warn!(target: "agent", error = %e, "tick skipped");
            return Ok(TickOutcome::Skipped);
        }
        AgentStats::incr(&self.stats.ticks);
        self.advance(AgentEvent::TickStarted)?;
        self.session.begin_tick(instruction);
        tracing::info!(target: "agent", instruction, "--- TICK START ---");

        let max_rounds = self.settings.max_rounds_per_tick.max(1);
        for round in 0..max_rounds {
            AgentStats::incr(&self.stats.planner_rounds);
            let planned = tokio::select! {
                _ = self.shutdown.cancelled() => None,
                planned = with_timeout(
                    "planner",
                    self.settings.planner_timeout,
                    self.planner.plan(&self.settings.system_prompt, self.session.history(), &self.tools),
                ) => Some(planned),
            };
            let Some(planned) = planned else {
                self.advance(AgentEvent::StopRequested)?;
                return Ok(TickOutcome::Stopped);
            };

            let reply = match planned {
                Ok(reply) => reply,
                Err(e) if e.is_unrecoverable_planner() => {
                    tracing::error!(target: "planner", error = %e, "planner rejected the session; stopping");
                    self.advance(AgentEvent::PlanFailed { recoverable: false })?;
                    return Ok(TickOutcome::Stopped);
                }
                Err(e) => {
                    self.advance(AgentEvent::PlanFailed { recoverable: true })?;
                    self.safety.report_failure();
                    AgentStats::incr(&self.stats.ticks_abandoned);
                    return Ok(TickOutcome::Abandoned(e));
                }
            };

            let total = self.session.record_usage(reply.usage_tokens);
            tracing::debug!(target: "planner", round, tokens = reply.usage_tokens, total, "planner replied");
            if let Some(text) = &reply.text {
                tracing::info!(target: "planner", "{text}");
            }

            let actions = reply.actions;
            self.session.record_plan(reply.text, actions.clone());
            self.advance(AgentEvent::PlanReceived {
                has_actions: !actions.is_empty(),
            })?;
            if actions.is_empty() {
                self.safety.report_success();
                return Ok(TickOutcome::Completed {
                    rounds: round + 1,
                    round_limit_hit: false,
                });
            }

            let results = self.dispatcher.execute_batch(&actions).await;
            self.session.record_results(results);
            self.advance(AgentEvent::ActionsCompleted)?;
        }

        tracing::warn!(target: "agent", max_rounds, "round limit reached; ending tick");
        self.advance(AgentEvent::TickAbandoned)?;
        self.safety.report_success();
        Ok(TickOutcome::Completed {
            rounds: max_rounds,
            round_limit_hit: true,
        })
    }
}
