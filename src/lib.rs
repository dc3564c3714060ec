//! Health monitor for a fleet of MySQL proxy instances
//!
//! Each configured instance is checked by a fixed battery of probes and the
//! verdicts are folded into a single OK / WARNING / FAILED report.

pub mod client;
pub mod config;
pub mod health;
pub mod inspect;
pub mod metrics;
pub mod protocol;
