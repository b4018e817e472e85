//! # signal-soft
//!
//! Tensor side of the Signal signalling game, built on candle.
//!
//! ## Key Components
//!
//! - [`Message`]: time-major `(msg_len, batch, n_symbols)` symbol distributions
//! - [`pack`] / [`PackedMessage`]: per-sequence effective lengths (first stop symbol + 1)
//! - [`agents`]: `Sender` / `Receiver` / `Predictor` contracts and reference candle agents
//! - [`losses`]: receiver and predictor losses, [`losses::compose_loss`]
//! - [`metrics`]: pure metric computation, named mapping, `tracing` emission
//! - [`training::SignallingGame`]: one orchestrator for the baseline,
//!   with-prediction and merged variants
//! - [`training::fit`]: epoch loop with AdamW and validation
//!
//! ## Architecture Rules
//!
//! - Every network owns a private `VarMap`; no parameter is shared.
//! - Train/eval mode is explicit on each network; only
//!   [`training::SignallingGame::evaluation_scope`] flips it.
//! - Metric computation returns data; only `metrics::emit_metrics` logs.

pub use signal_core;

// Internal shared primitives
mod nn;

pub mod agents;
pub mod losses;
pub mod message;
pub mod metrics;
pub mod packer;
pub mod training;

pub use message::Message;
pub use packer::{pack, PackedMessage};
