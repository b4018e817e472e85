//! # signal-core
//!
//! Shared vocabulary for the Signal signalling game.
//!
//! A sender observes an item and emits a message of `msg_len` symbols drawn
//! from `n_symbols`; a receiver reads the message plus a set of candidates and
//! must point at the item the sender saw.
//!
//! ## Key Components
//!
//! - [`SignalError`]: error type shared by every crate in the workspace
//! - [`NetworkMode`] / [`ModeFlag`]: explicit train/eval switch carried by each network
//! - [`Hparams`]: run hyperparameters, loadable from JSON
//! - [`GameVariant`]: which message-routing the orchestrator uses
//!
//! ## Architecture Rules
//!
//! - No tensor code here; `signal-soft` owns everything candle-related.
//! - No logging here; callers decide what to emit.

pub mod config;
pub mod error;
pub mod mode;

pub use config::{GameVariant, Hparams};
pub use error::SignalError;
pub use mode::{ModeFlag, NetworkMode};

/// Symbol index reserved as the end-of-message marker.
///
/// Positions after the first stop symbol in a message are padding.
pub const STOP_SYMBOL: u32 = 0;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, SignalError>;
