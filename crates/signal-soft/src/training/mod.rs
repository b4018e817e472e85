//! Training orchestration for the signalling game.
//!
//! - [`game`]: the [`SignallingGame`] orchestrator and its step protocol
//! - [`scope`]: scoped evaluation mode with guaranteed release
//! - [`fit`]: epoch loop with optimizer steps and periodic validation

pub mod fit;
pub mod game;
pub mod scope;

pub use fit::{fit, run_validation, FitConfig, FitResult, ValidationRecord};
pub use game::{
    ForwardOutput, GameBatch, GameConfig, GameParts, Prediction, PredictorParts, SignallingGame,
    StepOutput,
};
pub use scope::EvalModeGuard;
