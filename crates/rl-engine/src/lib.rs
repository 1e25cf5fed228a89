//! Bandit algorithm engine for Epsilon-Greedy and contextual LinUCB.
//!
//! Everything here is pure: selection reads statistics, updates return new
//! statistics, and nothing performs I/O.

#![warn(clippy::unwrap_used)]

pub mod egreedy;
pub mod engine;
pub mod linucb;

pub use engine::{inspect, select, update, ActionInsight};
pub use linucb::ArmScore;
