//! # signal-learn
//!
//! Data and tooling around the Signal training core.
//!
//! ## Key Components
//!
//! - [`dataset`]: synthetic attribute games encoded as [`GameBatch`](signal_soft::training::GameBatch)es
//! - [`rng::SimpleRng`]: seedable splitmix64 used for generation
//! - [`setup`]: reference agents and a wired [`SignallingGame`](signal_soft::training::SignallingGame) from `Hparams`
//! - [`inspect`]: decoded messages and symbol frequencies for a probe batch
//!
//! The `train-game` binary puts these together.
//!
//! ## Architecture Rules
//!
//! - Depends on `signal-core` and `signal-soft`.
//! - Only the binary installs a tracing subscriber.

pub mod dataset;
pub mod inspect;
pub mod rng;
pub mod setup;

pub use dataset::{AttributeGameDataset, DatasetConfig};
pub use setup::{build_game, GameSetup};

pub use signal_soft;
