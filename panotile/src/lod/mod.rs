//! Adaptive level of detail.
//!
//! [`AdaptiveLodMonitor`] trades texture detail for frame rate: it measures
//! render durations and adjusts the maximum texture magnification used by
//! face subdivision, then renders one sharp frame once the view is idle.

mod config;
mod monitor;

pub use config::AdaptiveLodConfig;
pub use monitor::{AdaptiveLodMonitor, LodState, RenderCause, RenderPhase};
