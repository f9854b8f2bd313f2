// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod directory;
pub mod http;
pub mod lnd;
pub mod planner;
pub mod swap;

pub use directory::{MempoolDirectory, NetworkDirectory};
pub use lnd::{ChannelManager, LndRestClient};
pub use planner::{ChatPlanner, Planner};
pub use swap::{LoopRestClient, SwapService};
