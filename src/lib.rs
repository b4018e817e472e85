//! Umbrella package for workspace-level integration tests.

pub use signal_core;
pub use signal_learn;
pub use signal_soft;
