// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod catalog;
pub mod confirm;
pub mod control;
pub mod dispatcher;
pub mod orchestrator;
pub mod prompt;
pub mod safety;
pub mod schema;
pub mod session;
pub mod state_machine;

pub use catalog::ActionKind;
pub use dispatcher::{ActionDispatcher, Collaborators, DispatchSettings};
pub use orchestrator::{LoopSettings, Orchestrator, TickOutcome};
