//! Hparams file → game → training → checkpoint → reloaded game.

use std::path::PathBuf;

use candle_core::Device;
use signal_core::{GameVariant, Hparams};
use signal_learn::dataset::{AttributeGameDataset, DatasetConfig};
use signal_learn::inspect::decode_messages;
use signal_learn::setup::build_game;
use signal_soft::training::{fit, FitConfig, GameBatch, SignallingGame};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("signal-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn eval_messages(game: &SignallingGame, batch: &GameBatch) -> Vec<Vec<u32>> {
    game.evaluation_scope(|g| {
        let msg = g.sender().forward(&batch.sender_input)?;
        decode_messages(&msg)
    })
    .unwrap()
}

#[test]
fn hparams_file_roundtrip() {
    let dir = scratch_dir("hparams");
    let path = dir.join("hparams.json");
    let hp = Hparams {
        variant: GameVariant::Merged,
        predictor_loss_weight: 0.25,
        ignore_index: Some(0),
        ..Hparams::default()
    };
    let text = serde_json::to_string_pretty(&hp).unwrap();
    assert!(text.contains("\"merged\""));
    std::fs::write(&path, text).unwrap();

    let loaded = Hparams::from_json_file(&path).unwrap();
    assert_eq!(loaded, hp);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn checkpoint_restores_sender_behaviour() {
    let hp = Hparams {
        hidden_dim: 16,
        batch_size: 8,
        learning_rate: 1e-2,
        variant: GameVariant::WithPrediction,
        ..Hparams::default()
    };
    let config = DatasetConfig {
        n_samples: 24,
        ..DatasetConfig::default()
    };
    let data = AttributeGameDataset::generate(&config, hp.seed).unwrap();
    let batches = data.batches(hp.batch_size, &Device::Cpu).unwrap();

    let trained = build_game(&hp, data.feature_dim(), &Device::Cpu).unwrap();
    let mut opt = trained.game.configure_optimizer(&hp).unwrap();
    fit(
        &trained.game,
        &mut opt,
        &batches,
        &[],
        &FitConfig {
            epochs: 2,
            ..FitConfig::default()
        },
    )
    .unwrap();

    let dir = scratch_dir("ckpt");
    for (name, vm) in &trained.var_maps {
        vm.save(dir.join(format!("{name}.safetensors"))).unwrap();
    }

    let mut restored = build_game(&hp, data.feature_dim(), &Device::Cpu).unwrap();
    for (name, vm) in &mut restored.var_maps {
        vm.load(dir.join(format!("{name}.safetensors"))).unwrap();
    }

    for batch in &batches {
        assert_eq!(
            eval_messages(&trained.game, batch),
            eval_messages(&restored.game, batch)
        );
    }
    std::fs::remove_dir_all(&dir).ok();
}
