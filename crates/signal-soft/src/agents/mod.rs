//! Contracts for the three networks the game orchestrates.
//!
//! Each network owns its own parameters (a private `VarMap`) and its own
//! [`ModeFlag`]. The orchestrator only talks to them through these traits,
//! so any architecture can be plugged in.
//!
//! The reference implementations ([`MlpSender`], [`LstmReceiver`],
//! [`LstmPredictor`]) operate on attribute feature vectors and are small
//! enough to train on CPU in tests.

use candle_core::{Tensor, Var};
use signal_core::{ModeFlag, NetworkMode, SignalError};

use crate::message::Message;
use crate::packer::PackedMessage;

pub mod predictor;
pub mod receiver;
pub mod sender;

pub use predictor::{LstmPredictor, LstmPredictorConfig};
pub use receiver::{LstmReceiver, LstmReceiverConfig};
pub use sender::{MlpSender, MlpSenderConfig};

/// Behaviour shared by every trainable network.
pub trait Network {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// The network's train/eval flag.
    fn mode_flag(&self) -> &ModeFlag;

    /// Learnable parameters owned by this network.
    fn vars(&self) -> Vec<Var>;

    fn mode(&self) -> NetworkMode {
        self.mode_flag().get()
    }

    fn set_mode(&self, mode: NetworkMode) {
        self.mode_flag().set(mode);
    }
}

/// Observes an input batch and emits a message.
pub trait Sender: Network {
    /// Timesteps per message.
    fn msg_len(&self) -> usize;

    /// Vocabulary size, stop symbol included.
    fn n_symbols(&self) -> usize;

    /// `input` is `(batch, features)`; the message is `(msg_len, batch, n_symbols)`.
    fn forward(&self, input: &Tensor) -> Result<Message, SignalError>;
}

/// What the receiver reads besides the candidates.
#[derive(Debug, Clone, Copy)]
pub enum ReceiverInput<'a> {
    /// The full message, padding included.
    Raw(&'a Message),
    /// The message with per-sequence effective lengths.
    Packed(&'a PackedMessage),
    /// A `(batch, hidden)` state produced by the predictor.
    Hidden(&'a Tensor),
}

/// Scores candidates given a message representation.
pub trait Receiver: Network {
    /// `candidates` is `(batch, n_candidates, features)`.
    ///
    /// Returns `(scores, probs)`, both `(batch, n_candidates)`.
    fn forward(
        &self,
        candidates: &Tensor,
        input: ReceiverInput<'_>,
    ) -> Result<(Tensor, Tensor), SignalError>;
}

/// Output of one predictor pass over a start-extended message.
#[derive(Debug, Clone)]
pub struct PredictorOutput {
    /// `(msg_len + 1, batch, n_symbols)` unnormalised next-symbol scores.
    pub logits: Tensor,
    /// Softmax of `logits` over the symbol axis.
    pub probs: Tensor,
    /// `(batch, hidden)` state after the final timestep.
    pub hidden: Tensor,
}

/// Causal next-symbol model.
pub trait Predictor: Network {
    /// `input` is the message with a start frame prepended.
    fn forward(&self, input: &Tensor) -> Result<PredictorOutput, SignalError>;

    /// Width of [`PredictorOutput::hidden`].
    fn hidden_dim(&self) -> usize;
}
