// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod agent;
pub mod graph;
pub mod liquidity;
pub mod metrics;
