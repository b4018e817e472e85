//! The signalling-game orchestrator.
//!
//! One [`SignallingGame`] covers all three routings via [`GameVariant`]:
//!
//! - **Baseline**: sender → message (raw or packed) → receiver
//! - **WithPrediction**: as baseline, plus a predictor on the message for an
//!   auxiliary loss; the receiver never sees predictor output
//! - **Merged**: message is packed, predictor runs, receiver reads the
//!   predictor's final hidden state
//!
//! ## Step protocol
//!
//! 1. Move the batch to the game's device
//! 2. Sender → message
//! 3. Route per variant → receiver `(out, out_probs)`, optional prediction
//! 4. `loss_receiver = receiver_loss(out_probs, target)`
//! 5. With a predictor: prepend a zero start frame, predict, drop the last
//!    output, flatten time × batch, `loss_predictor = predictor_loss(...)`
//! 6. `total = loss_receiver (+ weight × loss_predictor)`
//! 7. Receiver accuracy, predictor accuracy

use std::collections::{BTreeMap, HashSet};

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use signal_core::{GameVariant, Hparams, NetworkMode, SignalError};

use super::scope::EvalModeGuard;
use crate::agents::{Predictor, Receiver, ReceiverInput, Sender};
use crate::losses::{compose_loss, compose_scalar, PredictorLoss, ReceiverLoss};
use crate::message::Message;
use crate::metrics::{predictor_accuracy, receiver_accuracy, Phase, StepMetrics};
use crate::nn::tensor_err;
use crate::packer::{pack, PackedMessage};

/// Routing and loss settings of a game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub variant: GameVariant,

    /// Whether the receiver reads a packed message (ignored by `Merged`).
    pub pack_message: bool,

    /// Total loss = receiver_loss + predictor_loss_weight × predictor_loss.
    pub predictor_loss_weight: f64,

    /// Symbol class excluded from the predictor loss.
    pub ignore_index: Option<u32>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            variant: GameVariant::Baseline,
            pack_message: true,
            predictor_loss_weight: 1.0,
            ignore_index: None,
        }
    }
}

impl From<&Hparams> for GameConfig {
    fn from(hparams: &Hparams) -> Self {
        Self {
            variant: hparams.variant,
            pack_message: hparams.pack_message,
            predictor_loss_weight: hparams.predictor_loss_weight,
            ignore_index: hparams.ignore_index,
        }
    }
}

/// One batch from the data loader.
#[derive(Debug, Clone)]
pub struct GameBatch {
    /// `(batch, features)` item the sender sees.
    pub sender_input: Tensor,
    /// `(batch, n_candidates, features)` items the receiver chooses from.
    pub candidates: Tensor,
    /// `(batch,)` integer (u32 or i64) index of the sender's item among the candidates.
    pub target: Tensor,
}

impl GameBatch {
    pub fn new(sender_input: Tensor, candidates: Tensor, target: Tensor) -> Self {
        Self {
            sender_input,
            candidates,
            target,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.target.dims().first().copied().unwrap_or(0)
    }

    /// Copies all three tensors to `device` (no-op if already there).
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if a transfer fails.
    pub fn to_device(&self, device: &Device) -> Result<Self, SignalError> {
        let map_err = tensor_err("GameBatch::to_device");
        Ok(Self {
            sender_input: self.sender_input.to_device(device).map_err(&map_err)?,
            candidates: self.candidates.to_device(device).map_err(&map_err)?,
            target: self.target.to_device(device).map_err(map_err)?,
        })
    }
}

/// A predictor together with the loss it is trained on.
pub struct PredictorParts {
    pub predictor: Box<dyn Predictor>,
    pub loss: Box<dyn PredictorLoss>,
}

/// The injected collaborators of a game.
pub struct GameParts {
    pub sender: Box<dyn Sender>,
    pub receiver: Box<dyn Receiver>,
    pub receiver_loss: Box<dyn ReceiverLoss>,
    pub predictor: Option<PredictorParts>,
}

/// Teacher-forced predictor output aligned with the message.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// `(msg_len, batch, n_symbols)`; row `t` is trained against message step `t`.
    pub logits: Tensor,
    pub probs: Tensor,
}

/// Everything one forward pass produces.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    pub message: Message,
    pub packed: Option<PackedMessage>,
    pub out: Tensor,
    pub out_probs: Tensor,
    pub prediction: Option<Prediction>,
}

/// Loss to optimise plus the metrics of the step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub total_loss: Tensor,
    pub metrics: StepMetrics,
    pub phase: Phase,
}

impl StepOutput {
    /// Metric names with the phase prefix applied.
    pub fn named(&self) -> BTreeMap<String, f32> {
        self.metrics.to_named(self.phase)
    }
}

/// Sender, receiver and optional predictor wired for one game variant.
///
/// # Example
///
/// ```ignore
/// use signal_soft::training::{GameConfig, GameParts, SignallingGame};
///
/// let game = SignallingGame::new(parts, GameConfig::default(), Device::Cpu)?;
/// let mut opt = game.configure_optimizer(&hparams)?;
/// let step = game.training_step(&batch)?;
/// opt.backward_step(&step.total_loss)?;
/// ```
pub struct SignallingGame {
    sender: Box<dyn Sender>,
    receiver: Box<dyn Receiver>,
    receiver_loss: Box<dyn ReceiverLoss>,
    predictor: Option<PredictorParts>,
    config: GameConfig,
    device: Device,
}

impl std::fmt::Debug for SignallingGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SignallingGame({}, msg_len={}, n_symbols={}, predictor={}, device={:?})",
            self.config.variant.label(),
            self.sender.msg_len(),
            self.sender.n_symbols(),
            self.predictor.is_some(),
            self.device
        )
    }
}

impl SignallingGame {
    /// Wires the collaborators for `config.variant`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] if the variant needs a predictor and
    /// none was given (or the reverse), or if two networks share a parameter.
    pub fn new(parts: GameParts, config: GameConfig, device: Device) -> Result<Self, SignalError> {
        let needs_predictor = config.variant.uses_predictor();
        match (&parts.predictor, needs_predictor) {
            (None, true) => {
                return Err(SignalError::config(format!(
                    "variant '{}' requires a predictor",
                    config.variant.label()
                )))
            }
            (Some(_), false) => {
                return Err(SignalError::config(
                    "baseline variant does not take a predictor",
                ))
            }
            _ => {}
        }

        let game = Self {
            sender: parts.sender,
            receiver: parts.receiver,
            receiver_loss: parts.receiver_loss,
            predictor: parts.predictor,
            config,
            device,
        };
        game.check_disjoint_parameters()?;
        tracing::debug!(game = ?game, params = game.parameters().len(), "signalling game ready");
        Ok(game)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn variant(&self) -> GameVariant {
        self.config.variant
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn sender(&self) -> &dyn Sender {
        self.sender.as_ref()
    }

    pub fn receiver(&self) -> &dyn Receiver {
        self.receiver.as_ref()
    }

    pub fn predictor(&self) -> Option<&dyn Predictor> {
        self.predictor.as_ref().map(|p| p.predictor.as_ref())
    }

    /// Runs sender, predictor and receiver without computing losses.
    ///
    /// # Errors
    ///
    /// Propagates any network or tensor error unchanged.
    pub fn forward(
        &self,
        sender_input: &Tensor,
        candidates: &Tensor,
    ) -> Result<ForwardOutput, SignalError> {
        let message = self.sender.forward(sender_input)?;
        let msg_len = self.sender.msg_len();

        let (packed, prediction, out, out_probs) = match self.config.variant {
            GameVariant::Baseline | GameVariant::WithPrediction => {
                let packed = if self.config.pack_message {
                    Some(pack(&message, msg_len)?)
                } else {
                    None
                };
                let prediction = match self.predictor() {
                    Some(predictor) => Some(self.predict(predictor, &message)?.0),
                    None => None,
                };
                let input = match &packed {
                    Some(p) => ReceiverInput::Packed(p),
                    None => ReceiverInput::Raw(&message),
                };
                let (out, out_probs) = self.receiver.forward(candidates, input)?;
                (packed, prediction, out, out_probs)
            }
            GameVariant::Merged => {
                let packed = pack(&message, msg_len)?;
                let predictor = self
                    .predictor()
                    .ok_or_else(|| SignalError::config("merged variant requires a predictor"))?;
                let (prediction, hidden) = self.predict(predictor, &message)?;
                let (out, out_probs) = self
                    .receiver
                    .forward(candidates, ReceiverInput::Hidden(&hidden))?;
                (Some(packed), Some(prediction), out, out_probs)
            }
        };

        Ok(ForwardOutput {
            message,
            packed,
            out,
            out_probs,
            prediction,
        })
    }

    /// Teacher-forced prediction: start frame in, last output dropped.
    fn predict(
        &self,
        predictor: &dyn Predictor,
        message: &Message,
    ) -> Result<(Prediction, Tensor), SignalError> {
        let map_err = tensor_err("SignallingGame::predict");
        let input = message.with_start_frame()?;
        let output = predictor.forward(&input)?;
        let steps = message.msg_len();
        let logits = output.logits.narrow(0, 0, steps).map_err(&map_err)?;
        let probs = output.probs.narrow(0, 0, steps).map_err(map_err)?;
        Ok((Prediction { logits, probs }, output.hidden))
    }

    /// One training step: forward, losses, metrics.
    ///
    /// The returned `total_loss` is attached to the graph; the caller owns
    /// the optimizer step.
    ///
    /// # Errors
    ///
    /// Propagates network, loss and tensor errors unchanged;
    /// [`SignalError::EmptyBatch`] for a zero-size batch.
    pub fn training_step(&self, batch: &GameBatch) -> Result<StepOutput, SignalError> {
        self.compute_step(batch, Phase::Train)
    }

    /// One validation step: same computation with every network in eval
    /// mode, restored to train mode before returning (also on error).
    ///
    /// The returned loss is detached.
    ///
    /// # Errors
    ///
    /// Same as [`Self::training_step`].
    pub fn validation_step(&self, batch: &GameBatch) -> Result<StepOutput, SignalError> {
        self.evaluation_scope(|game| {
            let step = game.compute_step(batch, Phase::Validation)?;
            Ok(StepOutput {
                total_loss: step.total_loss.detach(),
                ..step
            })
        })
    }

    /// Runs `f` with every participating network in eval mode.
    ///
    /// Acquire: all mode flags set to eval. Release: each flag back to the
    /// mode it had on entry, whether `f` returns `Ok`, `Err` or panics. A
    /// nested scope therefore leaves the enclosing one in eval mode.
    pub fn evaluation_scope<T>(
        &self,
        f: impl FnOnce(&Self) -> Result<T, SignalError>,
    ) -> Result<T, SignalError> {
        let _guard = EvalModeGuard::acquire(self.mode_flags());
        f(self)
    }

    /// Current mode of each participating network, by name.
    pub fn network_modes(&self) -> Vec<(&str, NetworkMode)> {
        let mut modes = vec![
            (self.sender.name(), self.sender.mode()),
            (self.receiver.name(), self.receiver.mode()),
        ];
        if let Some(p) = self.predictor() {
            modes.push((p.name(), p.mode()));
        }
        modes
    }

    fn mode_flags(&self) -> Vec<&signal_core::ModeFlag> {
        let mut flags = vec![self.sender.mode_flag(), self.receiver.mode_flag()];
        if let Some(p) = self.predictor() {
            flags.push(p.mode_flag());
        }
        flags
    }

    fn compute_step(&self, batch: &GameBatch, phase: Phase) -> Result<StepOutput, SignalError> {
        let batch = batch.to_device(&self.device)?;
        let fwd = self.forward(&batch.sender_input, &batch.candidates)?;

        let loss_receiver = self.receiver_loss.loss(&fwd.out_probs, &batch.target)?;
        let accuracy = receiver_accuracy(&fwd.out_probs, &batch.target)?;

        let (total_loss, loss_predictor, accuracy_predictor) =
            match (&fwd.prediction, &self.predictor) {
                (Some(prediction), Some(parts)) => {
                    let map_err = tensor_err("SignallingGame::compute_step");
                    let rows = fwd.message.msg_len() * fwd.message.batch_size();
                    let n_symbols = fwd.message.n_symbols();
                    let logits = prediction
                        .logits
                        .reshape((rows, n_symbols))
                        .map_err(&map_err)?;
                    let probs = prediction
                        .probs
                        .reshape((rows, n_symbols))
                        .map_err(map_err)?;
                    let targets = fwd.message.flatten_steps()?;

                    let loss_predictor =
                        parts.loss.loss(&logits, &targets, self.config.ignore_index)?;
                    let total = compose_loss(
                        &loss_receiver,
                        Some((&loss_predictor, self.config.predictor_loss_weight)),
                    )?;
                    let acc = predictor_accuracy(&probs, &targets)?;
                    (total, Some(scalar_value(&loss_predictor)?), Some(acc))
                }
                _ => (compose_loss(&loss_receiver, None)?, None, None),
            };

        let loss_receiver = scalar_value(&loss_receiver)?;
        let metrics = StepMetrics {
            loss_receiver,
            total_loss: compose_scalar(
                loss_receiver,
                loss_predictor.map(|p| (p, self.config.predictor_loss_weight)),
            ),
            accuracy,
            loss_predictor,
            accuracy_predictor,
        };
        tracing::debug!(
            phase = ?phase,
            total_loss = metrics.total_loss,
            accuracy = metrics.accuracy,
            "step"
        );

        Ok(StepOutput {
            total_loss,
            metrics,
            phase,
        })
    }

    /// Union of the active networks' parameters.
    pub fn parameters(&self) -> Vec<Var> {
        let mut vars = self.sender.vars();
        vars.extend(self.receiver.vars());
        if let Some(p) = self.predictor() {
            vars.extend(p.vars());
        }
        vars
    }

    /// AdamW over [`Self::parameters`] with the run's learning rate.
    ///
    /// With the default `weight_decay` of zero this is plain Adam.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if the optimizer cannot be built.
    pub fn configure_optimizer(&self, hparams: &Hparams) -> Result<AdamW, SignalError> {
        let params = ParamsAdamW {
            lr: hparams.learning_rate,
            weight_decay: hparams.weight_decay,
            ..Default::default()
        };
        AdamW::new(self.parameters(), params).map_err(tensor_err("configure_optimizer"))
    }

    fn check_disjoint_parameters(&self) -> Result<(), SignalError> {
        let mut seen = HashSet::new();
        let mut owners: Vec<(&str, Vec<Var>)> = vec![
            (self.sender.name(), self.sender.vars()),
            (self.receiver.name(), self.receiver.vars()),
        ];
        if let Some(p) = self.predictor() {
            owners.push((p.name(), p.vars()));
        }
        for (owner, vars) in &owners {
            let own: HashSet<_> = vars.iter().map(|v| v.as_tensor().id()).collect();
            if own.iter().any(|id| seen.contains(id)) {
                return Err(SignalError::config(format!(
                    "{owner} shares parameters with another network"
                )));
            }
            seen.extend(own);
        }
        Ok(())
    }
}

/// Reads a loss tensor of any rank as one f32.
fn scalar_value(loss: &Tensor) -> Result<f32, SignalError> {
    loss.sum_all()
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_scalar::<f32>())
        .map_err(tensor_err("scalar_value"))
}
