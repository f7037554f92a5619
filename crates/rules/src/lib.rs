//! Performance anomaly rules over trace-derived metric tables.
//!
//! This crate provides:
//! - Six stateless detectors (skipped samples, long tasks, runnable ratio,
//!   core placement, short-run bursts, CPU hot spots)
//! - An aggregator that runs them in a fixed order, sequentially or on a
//!   rayon pool, and wraps the findings in an [`AnomalyReport`]

pub mod aggregator;
pub mod detectors;

pub use aggregator::{detect_anomalies, Aggregator, AnomalyReport};
pub use detectors::{Rule, RULES};
