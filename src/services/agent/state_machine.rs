// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    /// Between ticks, waiting for an instruction or the tick interval.
    Idle,
    AwaitingPlan,
    ExecutingActions,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    TickStarted,
    PlanReceived { has_actions: bool },
    ActionsCompleted,
    PlanFailed { recoverable: bool },
    TickAbandoned,
    StopRequested,
}

pub fn transition(current: AgentState, event: AgentEvent) -> Result<AgentState, AppError> {
    match (current, event) {
        (AgentState::Idle, AgentEvent::TickStarted) => Ok(AgentState::AwaitingPlan),
        (AgentState::AwaitingPlan, AgentEvent::PlanReceived { has_actions: true }) => {
            Ok(AgentState::ExecutingActions)
        }
        (AgentState::AwaitingPlan, AgentEvent::PlanReceived { has_actions: false }) => {
            Ok(AgentState::Idle)
        }
        (AgentState::ExecutingActions, AgentEvent::ActionsCompleted) => Ok(AgentState::AwaitingPlan),
        (AgentState::AwaitingPlan, AgentEvent::PlanFailed { recoverable: true }) => Ok(AgentState::Idle),
        (AgentState::AwaitingPlan, AgentEvent::PlanFailed { recoverable: false }) => {
            Ok(AgentState::Stopped)
        }
        (AgentState::AwaitingPlan | AgentState::ExecutingActions, AgentEvent::TickAbandoned) => {
            Ok(AgentState::Idle)
        }
        (_, AgentEvent::StopRequested) => Ok(AgentState::Stopped),
        _ => Err(AppError::Fatal(format!(
            "invalid agent transition from {current:?} on {event:?}"
        ))),
    }
}
