//! Engines that turn agent signals into verdicts, quality indices and
//! action plans.

pub mod consensus;
pub mod decision;
pub mod dqi;

pub use consensus::{ConsensusEngine, ResolvedWeight};
pub use decision::{ConfidenceBucket, DecisionEngine};
pub use dqi::{default_dimension, dimensions_from_signals, signal_quality, DqiEngine};
