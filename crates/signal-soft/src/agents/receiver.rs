//! Reference receiver: message encoder + candidate scorer.
//!
//! Architecture:
//! - message: LSTM(S→H) read at the last step (raw), or with padding zeroed
//!   and read at the last valid step (packed)
//! - hidden state (merged variant): Linear(P→H)
//! - candidates: Linear(F→H)
//! - score: dot(candidate_h, message_h), softmax over candidates

use candle_core::{DType, Device, Tensor, Var, D};
use candle_nn::{linear, lstm, LSTMConfig, Linear, Module, VarBuilder, VarMap, LSTM, RNN};
use signal_core::{ModeFlag, SignalError};

use super::{Network, Receiver, ReceiverInput};
use crate::nn::tensor_err;

#[derive(Debug, Clone)]
pub struct LstmReceiverConfig {
    pub n_symbols: usize,
    pub hidden_dim: usize,
    /// Feature width of one candidate.
    pub candidate_dim: usize,
    /// Width of the predictor hidden state accepted in the merged variant.
    pub state_dim: usize,
}

impl Default for LstmReceiverConfig {
    fn default() -> Self {
        Self {
            n_symbols: 3,
            hidden_dim: 64,
            candidate_dim: 16,
            state_dim: 64,
        }
    }
}

/// LSTM-encoding receiver that honours packed lengths.
pub struct LstmReceiver {
    encoder: LSTM,
    state_proj: Linear,
    candidate_proj: Linear,
    config: LstmReceiverConfig,
    var_map: VarMap,
    mode: ModeFlag,
}

impl std::fmt::Debug for LstmReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LstmReceiver(msg {}→{}, cand {}→{}, mode={:?})",
            self.config.n_symbols,
            self.config.hidden_dim,
            self.config.candidate_dim,
            self.config.hidden_dim,
            self.mode.get()
        )
    }
}

impl LstmReceiver {
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if parameter creation fails.
    pub fn new(config: &LstmReceiverConfig, device: &Device) -> Result<Self, SignalError> {
        let map_err = tensor_err("LstmReceiver::new");
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);

        let encoder = lstm(
            config.n_symbols,
            config.hidden_dim,
            LSTMConfig::default(),
            vb.pp("receiver.encoder"),
        )
        .map_err(&map_err)?;
        let state_proj = linear(config.state_dim, config.hidden_dim, vb.pp("receiver.state"))
            .map_err(&map_err)?;
        let candidate_proj = linear(
            config.candidate_dim,
            config.hidden_dim,
            vb.pp("receiver.candidates"),
        )
        .map_err(&map_err)?;

        Ok(Self {
            encoder,
            state_proj,
            candidate_proj,
            config: config.clone(),
            var_map,
            mode: ModeFlag::default(),
        })
    }

    pub fn var_map(&self) -> &VarMap {
        &self.var_map
    }

    /// Runs the encoder over a time-major message; returns `(T, B, H)` hidden states.
    fn encode_steps(&self, message: &Tensor) -> candle_core::Result<Tensor> {
        let xs = message.transpose(0, 1)?.contiguous()?;
        let states = self.encoder.seq(&xs)?;
        self.encoder
            .states_to_tensor(&states)?
            .transpose(0, 1)?
            .contiguous()
    }

    fn encode(&self, input: ReceiverInput<'_>) -> Result<Tensor, SignalError> {
        let map_err = tensor_err("LstmReceiver::encode");
        match input {
            ReceiverInput::Raw(message) => {
                let hs = self.encode_steps(message.tensor()).map_err(&map_err)?;
                let last = message.msg_len().saturating_sub(1);
                hs.get(last).map_err(map_err)
            }
            ReceiverInput::Packed(packed) => {
                let hs = self
                    .encode_steps(&packed.masked_data()?)
                    .map_err(map_err)?;
                packed.last_valid_step(&hs)
            }
            ReceiverInput::Hidden(state) => self.state_proj.forward(state).map_err(map_err),
        }
    }
}

impl Network for LstmReceiver {
    fn name(&self) -> &str {
        "receiver"
    }

    fn mode_flag(&self) -> &ModeFlag {
        &self.mode
    }

    fn vars(&self) -> Vec<Var> {
        self.var_map.all_vars()
    }
}

impl Receiver for LstmReceiver {
    fn forward(
        &self,
        candidates: &Tensor,
        input: ReceiverInput<'_>,
    ) -> Result<(Tensor, Tensor), SignalError> {
        let map_err = tensor_err("LstmReceiver::forward");

        let message_h = self.encode(input)?;
        let candidate_h = self.candidate_proj.forward(candidates).map_err(&map_err)?;

        // (B, N, H) x (B, H, 1) → (B, N)
        let scores = candidate_h
            .contiguous()
            .and_then(|c| c.matmul(&message_h.unsqueeze(2)?.contiguous()?))
            .and_then(|s| s.squeeze(2))
            .map_err(&map_err)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1).map_err(map_err)?;
        Ok((scores, probs))
    }
}
