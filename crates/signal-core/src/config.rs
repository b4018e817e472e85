//! Run hyperparameters.
//!
//! Loaded from a JSON file (every field optional, missing fields take the
//! defaults below) and then overridden by CLI flags in `train-game`.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// How the orchestrator routes the message to the receiver.
///
/// # Example
///
/// ```
/// use signal_core::GameVariant;
///
/// let v: GameVariant = "with_prediction".parse().unwrap();
/// assert!(v.uses_predictor());
/// assert!(!GameVariant::Baseline.uses_predictor());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Sender → (optionally packed) message → receiver.
    #[default]
    Baseline,
    /// Predictor runs on the message for an auxiliary loss; receiver reads the message.
    WithPrediction,
    /// Receiver reads the predictor's final hidden state instead of the message.
    Merged,
}

impl GameVariant {
    /// Returns `true` if this variant needs a predictor network.
    pub fn uses_predictor(self) -> bool {
        !matches!(self, Self::Baseline)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::WithPrediction => "with_prediction",
            Self::Merged => "merged",
        }
    }
}

impl FromStr for GameVariant {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Self::Baseline),
            "with_prediction" => Ok(Self::WithPrediction),
            "merged" => Ok(Self::Merged),
            other => Err(SignalError::config(format!(
                "unknown variant '{other}'. Valid: baseline, with_prediction, merged"
            ))),
        }
    }
}

/// Hyperparameters for one training run.
///
/// # Example
///
/// ```
/// use signal_core::Hparams;
///
/// let hp: Hparams = serde_json::from_str(r#"{"learning_rate": 0.01}"#).unwrap();
/// assert_eq!(hp.learning_rate, 0.01);
/// assert_eq!(hp.msg_len, 5);
/// hp.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hparams {
    /// Optimizer learning rate (default: 1e-3).
    pub learning_rate: f64,

    /// Weight of the predictor loss in the total (default: 1.0).
    /// Total loss = receiver_loss + predictor_loss_weight × predictor_loss.
    pub predictor_loss_weight: f64,

    /// AdamW weight decay (default: 0.0, which makes the optimizer plain Adam).
    pub weight_decay: f64,

    /// Symbol class excluded from the predictor loss (default: none).
    pub ignore_index: Option<u32>,

    /// Message length in timesteps (default: 5).
    pub msg_len: usize,

    /// Vocabulary size including the stop symbol (default: 3).
    pub n_symbols: usize,

    /// Hidden width of the reference agents (default: 64).
    pub hidden_dim: usize,

    /// Samples per batch (default: 32).
    pub batch_size: usize,

    /// Passes over the training set (default: 10).
    pub epochs: usize,

    /// Whether the receiver gets a packed message (default: true).
    pub pack_message: bool,

    /// Message routing (default: baseline).
    pub variant: GameVariant,

    /// Seed for data generation (default: 42).
    pub seed: u64,
}

impl Default for Hparams {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            predictor_loss_weight: 1.0,
            weight_decay: 0.0,
            ignore_index: None,
            msg_len: 5,
            n_symbols: 3,
            hidden_dim: 64,
            batch_size: 32,
            epochs: 10,
            pack_message: true,
            variant: GameVariant::Baseline,
            seed: 42,
        }
    }
}

impl Hparams {
    /// Reads hyperparameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Io`] if the file cannot be read and
    /// [`SignalError::Json`] if it is not valid JSON for this struct.
    pub fn from_json_file(path: &Path) -> Result<Self, SignalError> {
        let text = std::fs::read_to_string(path)?;
        let hparams: Self = serde_json::from_str(&text)?;
        Ok(hparams)
    }

    /// Checks the values a run cannot start without.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SignalError> {
        if !(self.learning_rate > 0.0) {
            return Err(SignalError::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.msg_len == 0 {
            return Err(SignalError::config("msg_len must be at least 1"));
        }
        if self.n_symbols < 2 {
            return Err(SignalError::config(format!(
                "n_symbols must be at least 2 (stop symbol plus one), got {}",
                self.n_symbols
            )));
        }
        if self.batch_size == 0 {
            return Err(SignalError::config("batch_size must be at least 1"));
        }
        if let Some(idx) = self.ignore_index {
            if idx as usize >= self.n_symbols {
                return Err(SignalError::config(format!(
                    "ignore_index {idx} out of range for {} symbols",
                    self.n_symbols
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_sensible() {
        let hp = Hparams::default();
        assert!(hp.validate().is_ok());
        assert_eq!(hp.variant, GameVariant::Baseline);
        assert!(hp.ignore_index.is_none());
        assert!(hp.pack_message);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let hp: Hparams =
            serde_json::from_str(r#"{"variant": "merged", "predictor_loss_weight": 0.5}"#)
                .unwrap();
        assert_eq!(hp.variant, GameVariant::Merged);
        assert_eq!(hp.predictor_loss_weight, 0.5);
        assert_eq!(hp.n_symbols, 3);
    }

    #[test]
    fn json_file_roundtrip() {
        let path = std::env::temp_dir().join("signal_core_hparams_test.json");
        let hp = Hparams {
            learning_rate: 5e-4,
            ignore_index: Some(0),
            ..Hparams::default()
        };
        std::fs::write(&path, serde_json::to_string(&hp).unwrap()).unwrap();
        let loaded = Hparams::from_json_file(&path).unwrap();
        assert_eq!(loaded, hp);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Hparams::from_json_file(Path::new("/nonexistent/hparams.json")).unwrap_err();
        assert!(matches!(err, SignalError::Io(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_lr = Hparams {
            learning_rate: 0.0,
            ..Hparams::default()
        };
        assert!(bad_lr.validate().is_err());

        let bad_len = Hparams {
            msg_len: 0,
            ..Hparams::default()
        };
        assert!(bad_len.validate().is_err());

        let bad_vocab = Hparams {
            n_symbols: 1,
            ..Hparams::default()
        };
        assert!(bad_vocab.validate().is_err());

        let bad_ignore = Hparams {
            ignore_index: Some(3),
            ..Hparams::default()
        };
        assert!(bad_ignore.validate().is_err());
    }

    #[test]
    fn variant_parse() {
        assert_eq!("baseline".parse::<GameVariant>().unwrap(), GameVariant::Baseline);
        assert_eq!("merged".parse::<GameVariant>().unwrap(), GameVariant::Merged);
        assert!("lstm".parse::<GameVariant>().is_err());
        assert_eq!(GameVariant::WithPrediction.label(), "with_prediction");
    }
}
