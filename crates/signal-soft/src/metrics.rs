//! Step metrics: computed here, emitted elsewhere.
//!
//! [`StepMetrics`] is plain data. [`StepMetrics::to_named`] turns it into the
//! name → value mapping that gets logged (`loss_receiver`, `total_loss`,
//! `accuracy`, `loss_predictor`, `accuracy predictor`, with `val_` / `val `
//! prefixes for validation). [`emit_metrics`] is the only function here with
//! a side effect.

use std::collections::BTreeMap;

use candle_core::{DType, Tensor, D};
use signal_core::SignalError;

use crate::nn::tensor_err;

pub const LOSS_RECEIVER: &str = "loss_receiver";
pub const TOTAL_LOSS: &str = "total_loss";
pub const ACCURACY: &str = "accuracy";
pub const LOSS_PREDICTOR: &str = "loss_predictor";
pub const ACCURACY_PREDICTOR: &str = "accuracy predictor";

/// Which loop a metric came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Validation,
}

impl Phase {
    /// Applies the phase prefix to a metric name.
    ///
    /// Validation names get `val_`, or `val ` for space-separated names.
    ///
    /// # Example
    ///
    /// ```
    /// use signal_soft::metrics::Phase;
    ///
    /// assert_eq!(Phase::Validation.metric_name("accuracy"), "val_accuracy");
    /// assert_eq!(Phase::Validation.metric_name("accuracy predictor"), "val accuracy predictor");
    /// assert_eq!(Phase::Train.metric_name("accuracy"), "accuracy");
    /// ```
    pub fn metric_name(self, name: &str) -> String {
        match self {
            Self::Train => name.to_string(),
            Self::Validation if name.contains(' ') => format!("val {name}"),
            Self::Validation => format!("val_{name}"),
        }
    }
}

/// Scalar metrics of one training or validation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub loss_receiver: f32,
    pub total_loss: f32,
    /// Fraction of the batch where the receiver picked the target.
    pub accuracy: f32,
    pub loss_predictor: Option<f32>,
    /// Fraction of (time × batch) positions where the predictor's argmax
    /// matched the message symbol.
    pub accuracy_predictor: Option<f32>,
}

impl StepMetrics {
    /// Named values, predictor entries only when a predictor ran.
    pub fn to_named(&self, phase: Phase) -> BTreeMap<String, f32> {
        let mut named = BTreeMap::new();
        named.insert(phase.metric_name(LOSS_RECEIVER), self.loss_receiver);
        named.insert(phase.metric_name(TOTAL_LOSS), self.total_loss);
        named.insert(phase.metric_name(ACCURACY), self.accuracy);
        if let Some(v) = self.loss_predictor {
            named.insert(phase.metric_name(LOSS_PREDICTOR), v);
        }
        if let Some(v) = self.accuracy_predictor {
            named.insert(phase.metric_name(ACCURACY_PREDICTOR), v);
        }
        named
    }
}

/// Fraction of rows where `argmax(out_probs) == target`.
///
/// `target` may be any integer dtype; it is compared as `u32`.
///
/// # Errors
///
/// Returns [`SignalError::EmptyBatch`] for a zero-row batch.
pub fn receiver_accuracy(out_probs: &Tensor, target: &Tensor) -> Result<f32, SignalError> {
    let map_err = tensor_err("receiver_accuracy");
    if target.elem_count() == 0 {
        return Err(empty("receiver accuracy"));
    }
    let predicted = out_probs
        .argmax(D::Minus1)
        .and_then(|t| t.to_vec1::<u32>())
        .map_err(&map_err)?;
    let target = target
        .to_dtype(DType::U32)
        .and_then(|t| t.to_vec1::<u32>())
        .map_err(map_err)?;
    matching_fraction(&predicted, &target, "receiver accuracy")
}

/// Fraction of rows where `argmax(prediction_probs) == argmax(message)`.
///
/// Both inputs are flattened `(msg_len * batch, n_symbols)`.
///
/// # Errors
///
/// Returns [`SignalError::EmptyBatch`] if there are no positions.
pub fn predictor_accuracy(
    prediction_probs: &Tensor,
    message_flat: &Tensor,
) -> Result<f32, SignalError> {
    let map_err = tensor_err("predictor_accuracy");
    if message_flat.elem_count() == 0 {
        return Err(empty("predictor accuracy"));
    }
    let predicted = prediction_probs
        .argmax(D::Minus1)
        .and_then(|t| t.to_vec1::<u32>())
        .map_err(&map_err)?;
    let actual = message_flat
        .argmax(D::Minus1)
        .and_then(|t| t.to_vec1::<u32>())
        .map_err(map_err)?;
    matching_fraction(&predicted, &actual, "predictor accuracy")
}

fn matching_fraction(predicted: &[u32], actual: &[u32], what: &str) -> Result<f32, SignalError> {
    if actual.is_empty() {
        return Err(empty(what));
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    Ok(correct as f32 / actual.len() as f32)
}

fn empty(what: &str) -> SignalError {
    SignalError::EmptyBatch {
        what: what.to_string(),
    }
}

/// Running means of named metrics, for per-epoch reporting.
#[derive(Debug, Clone, Default)]
pub struct MetricMeans {
    sums: BTreeMap<String, (f64, usize)>,
}

impl MetricMeans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, named: &BTreeMap<String, f32>) {
        for (name, &value) in named {
            let entry = self.sums.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += f64::from(value);
            entry.1 += 1;
        }
    }

    pub fn means(&self) -> BTreeMap<String, f32> {
        self.sums
            .iter()
            .map(|(name, &(sum, n))| (name.clone(), (sum / n as f64) as f32))
            .collect()
    }
}

/// Writes named metrics as structured `tracing` events.
pub fn emit_metrics(named: &BTreeMap<String, f32>, step: usize) {
    for (name, value) in named {
        tracing::info!(target: "signal::metrics", step, metric = %name, value = *value);
    }
}
