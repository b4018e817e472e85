//! Reference next-symbol predictor.
//!
//! Architecture: LSTM(S→H) over the start-extended message → Linear(H→S) per step.
//! The LSTM is causal, so the output at position `t` depends only on frames
//! `0..=t` of its input.

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{linear, lstm, LSTMConfig, Linear, Module, VarBuilder, VarMap, LSTM, RNN};
use signal_core::{ModeFlag, SignalError};

use super::{Network, Predictor, PredictorOutput};
use crate::nn::tensor_err;

#[derive(Debug, Clone)]
pub struct LstmPredictorConfig {
    pub n_symbols: usize,
    pub hidden_dim: usize,
}

impl Default for LstmPredictorConfig {
    fn default() -> Self {
        Self {
            n_symbols: 3,
            hidden_dim: 64,
        }
    }
}

/// Single-layer LSTM predictor.
///
/// # Example
///
/// ```ignore
/// use candle_core::Device;
/// use signal_soft::agents::{LstmPredictor, LstmPredictorConfig, Predictor};
///
/// let predictor = LstmPredictor::new(&LstmPredictorConfig::default(), &Device::Cpu).unwrap();
/// assert_eq!(predictor.hidden_dim(), 64);
/// ```
pub struct LstmPredictor {
    lstm: LSTM,
    out: Linear,
    config: LstmPredictorConfig,
    var_map: VarMap,
    mode: ModeFlag,
}

impl std::fmt::Debug for LstmPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LstmPredictor({}→{}→{}, mode={:?})",
            self.config.n_symbols,
            self.config.hidden_dim,
            self.config.n_symbols,
            self.mode.get()
        )
    }
}

impl LstmPredictor {
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if parameter creation fails.
    pub fn new(config: &LstmPredictorConfig, device: &Device) -> Result<Self, SignalError> {
        let map_err = tensor_err("LstmPredictor::new");
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);

        let lstm = lstm(
            config.n_symbols,
            config.hidden_dim,
            LSTMConfig::default(),
            vb.pp("predictor.lstm"),
        )
        .map_err(&map_err)?;
        let out = linear(config.hidden_dim, config.n_symbols, vb.pp("predictor.out"))
            .map_err(&map_err)?;

        Ok(Self {
            lstm,
            out,
            config: config.clone(),
            var_map,
            mode: ModeFlag::default(),
        })
    }

    pub fn var_map(&self) -> &VarMap {
        &self.var_map
    }
}

impl Network for LstmPredictor {
    fn name(&self) -> &str {
        "predictor"
    }

    fn mode_flag(&self) -> &ModeFlag {
        &self.mode
    }

    fn vars(&self) -> Vec<Var> {
        self.var_map.all_vars()
    }
}

impl Predictor for LstmPredictor {
    fn forward(&self, input: &Tensor) -> Result<PredictorOutput, SignalError> {
        let map_err = tensor_err("LstmPredictor::forward");

        // LSTM expects batch-major (B, T, S)
        let xs = input
            .transpose(0, 1)
            .and_then(|t| t.contiguous())
            .map_err(&map_err)?;
        let states = self.lstm.seq(&xs).map_err(&map_err)?;
        let hidden = states
            .last()
            .map(|s| s.h().clone())
            .ok_or_else(|| SignalError::Tensor {
                message: "LstmPredictor::forward: empty input sequence".to_string(),
            })?;
        let hs = self.lstm.states_to_tensor(&states).map_err(&map_err)?;

        let logits = self
            .out
            .forward(&hs)
            .and_then(|t| t.transpose(0, 1))
            .and_then(|t| t.contiguous())
            .map_err(&map_err)?;
        let probs = candle_nn::ops::softmax_last_dim(&logits).map_err(&map_err)?;

        Ok(PredictorOutput {
            logits,
            probs,
            hidden,
        })
    }

    fn hidden_dim(&self) -> usize {
        self.config.hidden_dim
    }
}
