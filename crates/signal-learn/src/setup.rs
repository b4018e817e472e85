//! Builds a ready-to-train game from [`Hparams`].
//!
//! Each factory creates one reference network; [`build_game`] wires them for
//! the configured variant and keeps a handle on every `VarMap` so the binary
//! can checkpoint them afterwards.

use candle_core::Device;
use candle_nn::VarMap;
use signal_core::{Hparams, SignalError};
use signal_soft::agents::{
    LstmPredictor, LstmPredictorConfig, LstmReceiver, LstmReceiverConfig, MlpSender,
    MlpSenderConfig, Predictor,
};
use signal_soft::losses::{CrossEntropyReceiverLoss, SoftCrossEntropy};
use signal_soft::training::{GameConfig, GameParts, PredictorParts, SignallingGame};

pub fn get_sender(
    hparams: &Hparams,
    feature_dim: usize,
    device: &Device,
) -> Result<MlpSender, SignalError> {
    let config = MlpSenderConfig {
        input_dim: feature_dim,
        hidden_dim: hparams.hidden_dim,
        msg_len: hparams.msg_len,
        n_symbols: hparams.n_symbols,
        ..MlpSenderConfig::default()
    };
    MlpSender::new(&config, device)
}

/// `state_dim` is the width of the predictor state read by the merged variant.
pub fn get_receiver(
    hparams: &Hparams,
    feature_dim: usize,
    state_dim: usize,
    device: &Device,
) -> Result<LstmReceiver, SignalError> {
    let config = LstmReceiverConfig {
        n_symbols: hparams.n_symbols,
        hidden_dim: hparams.hidden_dim,
        candidate_dim: feature_dim,
        state_dim,
    };
    LstmReceiver::new(&config, device)
}

pub fn get_predictor(hparams: &Hparams, device: &Device) -> Result<LstmPredictor, SignalError> {
    let config = LstmPredictorConfig {
        n_symbols: hparams.n_symbols,
        hidden_dim: hparams.hidden_dim,
    };
    LstmPredictor::new(&config, device)
}

/// A wired game plus the parameter stores of its networks.
pub struct GameSetup {
    pub game: SignallingGame,
    /// `(network name, parameters)`; `VarMap` clones share storage.
    pub var_maps: Vec<(&'static str, VarMap)>,
}

impl std::fmt::Debug for GameSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.var_maps.iter().map(|(n, _)| *n).collect();
        write!(f, "GameSetup({:?}, var_maps={names:?})", self.game)
    }
}

/// Validates `hparams` and builds sender, receiver and (if the variant needs
/// one) predictor, with cross-entropy losses.
///
/// # Errors
///
/// Returns [`SignalError::Config`] for invalid hyperparameters and
/// propagates network construction errors.
pub fn build_game(
    hparams: &Hparams,
    feature_dim: usize,
    device: &Device,
) -> Result<GameSetup, SignalError> {
    hparams.validate()?;

    let predictor = if hparams.variant.uses_predictor() {
        Some(get_predictor(hparams, device)?)
    } else {
        None
    };
    let state_dim = predictor
        .as_ref()
        .map_or(hparams.hidden_dim, |p| p.hidden_dim());

    let sender = get_sender(hparams, feature_dim, device)?;
    let receiver = get_receiver(hparams, feature_dim, state_dim, device)?;
    let mut var_maps = vec![
        ("sender", sender.var_map().clone()),
        ("receiver", receiver.var_map().clone()),
    ];

    let predictor = predictor.map(|predictor| {
        var_maps.push(("predictor", predictor.var_map().clone()));
        PredictorParts {
            predictor: Box::new(predictor) as Box<dyn Predictor>,
            loss: Box::new(SoftCrossEntropy),
        }
    });

    let parts = GameParts {
        sender: Box::new(sender),
        receiver: Box::new(receiver),
        receiver_loss: Box::new(CrossEntropyReceiverLoss),
        predictor,
    };
    let game = SignallingGame::new(parts, GameConfig::from(hparams), device.clone())?;
    Ok(GameSetup { game, var_maps })
}
