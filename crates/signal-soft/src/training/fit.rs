//! Epoch loop around [`SignallingGame`].
//!
//! Per epoch:
//! 1. For each training batch: `training_step` → `optimizer.backward_step(total_loss)`
//! 2. Accumulate per-step metrics into epoch means
//! 3. Every `validation_interval` epochs: `validation_step` over the held-out batches

use std::collections::BTreeMap;

use candle_nn::Optimizer;
use signal_core::SignalError;

use super::game::{GameBatch, SignallingGame};
use crate::metrics::{emit_metrics, MetricMeans, ACCURACY, TOTAL_LOSS};
use crate::nn::tensor_err;

/// Loop settings.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Passes over the training batches (default: 10).
    pub epochs: usize,

    /// Epochs between validation runs; 0 disables validation (default: 1).
    pub validation_interval: usize,

    /// Emit per-step metrics every this many steps; 0 disables (default: 0).
    pub log_every_n_steps: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            validation_interval: 1,
            log_every_n_steps: 0,
        }
    }
}

/// Validation means recorded after a given epoch.
#[derive(Debug, Clone)]
pub struct ValidationRecord {
    /// 1-based epoch after which validation ran.
    pub epoch: usize,
    pub metrics: BTreeMap<String, f32>,
}

/// Histories collected by [`fit`].
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Total loss of every optimizer step.
    pub loss_history: Vec<f32>,

    /// Mean training metrics per epoch.
    pub epoch_metrics: Vec<BTreeMap<String, f32>>,

    pub validation: Vec<ValidationRecord>,

    pub steps_completed: usize,

    /// Total loss of the last step, NaN if none ran.
    pub final_loss: f32,
}

/// Trains `game` with `optimizer` over `train` for `config.epochs` epochs.
///
/// # Errors
///
/// Returns [`SignalError::Dataset`] if `train` is empty, and propagates any
/// step or optimizer error.
pub fn fit<O: Optimizer>(
    game: &SignallingGame,
    optimizer: &mut O,
    train: &[GameBatch],
    validation: &[GameBatch],
    config: &FitConfig,
) -> Result<FitResult, SignalError> {
    if train.is_empty() {
        return Err(SignalError::Dataset {
            message: "fit: no training batches provided".to_string(),
        });
    }

    let mut loss_history = Vec::with_capacity(config.epochs * train.len());
    let mut epoch_metrics = Vec::with_capacity(config.epochs);
    let mut validation_records = Vec::new();
    let mut step = 0usize;

    for epoch in 1..=config.epochs {
        let mut means = MetricMeans::new();

        for batch in train {
            let out = game.training_step(batch)?;
            optimizer
                .backward_step(&out.total_loss)
                .map_err(tensor_err("fit backward_step"))?;

            let named = out.named();
            loss_history.push(out.metrics.total_loss);
            if config.log_every_n_steps > 0 && step % config.log_every_n_steps == 0 {
                emit_metrics(&named, step);
            }
            means.add(&named);
            step += 1;
        }

        let epoch_means = means.means();
        tracing::info!(
            epoch,
            steps = step,
            total_loss = epoch_means.get(TOTAL_LOSS).copied().unwrap_or(f32::NAN),
            accuracy = epoch_means.get(ACCURACY).copied().unwrap_or(f32::NAN),
            "epoch complete"
        );
        emit_metrics(&epoch_means, step);
        epoch_metrics.push(epoch_means);

        if !validation.is_empty()
            && config.validation_interval > 0
            && epoch % config.validation_interval == 0
        {
            let record = run_validation(game, validation, epoch)?;
            emit_metrics(&record.metrics, step);
            validation_records.push(record);
        }
    }

    let final_loss = loss_history.last().copied().unwrap_or(f32::NAN);
    Ok(FitResult {
        loss_history,
        epoch_metrics,
        validation: validation_records,
        steps_completed: step,
        final_loss,
    })
}

/// Mean validation metrics over all held-out batches.
///
/// # Errors
///
/// Propagates the first failing validation step.
pub fn run_validation(
    game: &SignallingGame,
    batches: &[GameBatch],
    epoch: usize,
) -> Result<ValidationRecord, SignalError> {
    let mut means = MetricMeans::new();
    for batch in batches {
        let out = game.validation_step(batch)?;
        means.add(&out.named());
    }
    Ok(ValidationRecord {
        epoch,
        metrics: means.means(),
    })
}
