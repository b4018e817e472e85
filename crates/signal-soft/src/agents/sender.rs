//! Reference sender: feature vector → per-step symbol distributions.
//!
//! Architecture: Input(F) → Linear(F→H) → GELU → Dropout → Linear(H→L·S) → softmax per step
//!
//! In [`NetworkMode::Train`] the emitted symbols are one-hot in the forward
//! pass with softmax gradients (straight-through). In [`NetworkMode::Eval`]
//! they are plain one-hot and dropout is off.

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder, VarMap};
use signal_core::{ModeFlag, NetworkMode, SignalError};

use super::{Network, Sender};
use crate::message::Message;
use crate::nn::{hard_one_hot, tensor_err};

/// Shape of an [`MlpSender`].
#[derive(Debug, Clone)]
pub struct MlpSenderConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub msg_len: usize,
    pub n_symbols: usize,
    /// Dropout probability on the hidden layer (default: 0.1).
    pub dropout: f32,
    /// Softmax temperature (default: 1.0).
    pub temperature: f64,
}

impl Default for MlpSenderConfig {
    fn default() -> Self {
        Self {
            input_dim: 16,
            hidden_dim: 64,
            msg_len: 5,
            n_symbols: 3,
            dropout: 0.1,
            temperature: 1.0,
        }
    }
}

/// Two-layer MLP sender with a straight-through discrete output.
///
/// # Example
///
/// ```ignore
/// use candle_core::{Device, Tensor};
/// use signal_soft::agents::{MlpSender, MlpSenderConfig, Sender};
///
/// let sender = MlpSender::new(&MlpSenderConfig::default(), &Device::Cpu).unwrap();
/// let input = Tensor::zeros((4, 16), candle_core::DType::F32, &Device::Cpu).unwrap();
/// let msg = sender.forward(&input).unwrap();
/// assert_eq!(msg.tensor().dims(), &[5, 4, 3]);
/// ```
pub struct MlpSender {
    hidden: Linear,
    heads: Linear,
    dropout: Dropout,
    config: MlpSenderConfig,
    var_map: VarMap,
    mode: ModeFlag,
}

impl std::fmt::Debug for MlpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MlpSender({}→{}→{}×{}, mode={:?})",
            self.config.input_dim,
            self.config.hidden_dim,
            self.config.msg_len,
            self.config.n_symbols,
            self.mode.get()
        )
    }
}

impl MlpSender {
    /// Creates a sender with freshly initialised parameters in its own `VarMap`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if parameter creation fails.
    pub fn new(config: &MlpSenderConfig, device: &Device) -> Result<Self, SignalError> {
        let map_err = tensor_err("MlpSender::new");
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);

        let hidden = linear(config.input_dim, config.hidden_dim, vb.pp("sender.hidden"))
            .map_err(&map_err)?;
        let heads = linear(
            config.hidden_dim,
            config.msg_len * config.n_symbols,
            vb.pp("sender.heads"),
        )
        .map_err(&map_err)?;

        Ok(Self {
            hidden,
            heads,
            dropout: Dropout::new(config.dropout),
            config: config.clone(),
            var_map,
            mode: ModeFlag::default(),
        })
    }

    /// The `VarMap` holding this sender's parameters, for checkpointing.
    pub fn var_map(&self) -> &VarMap {
        &self.var_map
    }

    pub fn config(&self) -> &MlpSenderConfig {
        &self.config
    }
}

impl Network for MlpSender {
    fn name(&self) -> &str {
        "sender"
    }

    fn mode_flag(&self) -> &ModeFlag {
        &self.mode
    }

    fn vars(&self) -> Vec<Var> {
        self.var_map.all_vars()
    }
}

impl Sender for MlpSender {
    fn msg_len(&self) -> usize {
        self.config.msg_len
    }

    fn n_symbols(&self) -> usize {
        self.config.n_symbols
    }

    fn forward(&self, input: &Tensor) -> Result<Message, SignalError> {
        let map_err = tensor_err("MlpSender::forward");
        let train = self.mode() == NetworkMode::Train;
        let batch = input.dim(0).map_err(&map_err)?;

        let h = self.hidden.forward(input).map_err(&map_err)?;
        let h = h.gelu_erf().map_err(&map_err)?;
        let h = self.dropout.forward(&h, train).map_err(&map_err)?;

        let logits = self.heads.forward(&h).map_err(&map_err)?;
        let logits = (logits / self.config.temperature).map_err(&map_err)?;
        // (B, L·S) → (L, B, S)
        let logits = logits
            .reshape((batch, self.config.msg_len, self.config.n_symbols))
            .and_then(|t| t.transpose(0, 1))
            .and_then(|t| t.contiguous())
            .map_err(&map_err)?;

        let soft = candle_nn::ops::softmax_last_dim(&logits).map_err(&map_err)?;
        let hard = hard_one_hot(&soft).map_err(&map_err)?;

        let symbols = if train {
            // one-hot forward, softmax backward
            let residual = (&hard - &soft).map_err(&map_err)?.detach();
            (residual + &soft).map_err(&map_err)?
        } else {
            hard
        };

        Message::new(symbols)
    }
}
