// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod analyzer;
pub mod closures;
pub mod fees;
pub mod openings;
pub mod rebalance;
pub mod swaps;

pub use fees::FeeStrategy;
pub use openings::{OpenOperation, OpeningPlan};
