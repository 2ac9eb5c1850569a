//! ironpool-autoscale — power-aware pool autoscaler.
//!
//! Resizes node pools to a desired node count by waking machines over
//! Wake-on-LAN and shutting them down over SSH. Candidate selection is
//! power-aware (cheapest nodes wake first, hungriest shut down first) and
//! all-or-nothing; per-node actions run concurrently and claim their node
//! with a guarded store transition, so concurrent scale requests can
//! never act on the same machine twice.

pub mod error;
pub mod scaler;
pub mod selection;

pub use error::ScaleError;
pub use scaler::{PoolScaler, ScaleDirection, ScaleOutcome};
