//! Loss functions and the loss composer.
//!
//! The orchestrator takes its two loss functions as injected collaborators:
//! [`ReceiverLoss`] over `(out_probs, target)` and [`PredictorLoss`] over
//! flattened logits, soft targets and an optional ignored class. Any closure
//! with the right signature implements either trait.
//!
//! [`compose_loss`] combines them:
//! `total = receiver_loss + weight × predictor_loss`.

use candle_core::{Tensor, D};
use signal_core::SignalError;

use crate::nn::tensor_err;

/// Loss of the receiver's candidate choice.
pub trait ReceiverLoss {
    /// `out_probs` is `(batch, n_candidates)`, `target` is `(batch,)` u32 or i64.
    fn loss(&self, out_probs: &Tensor, target: &Tensor) -> Result<Tensor, SignalError>;
}

impl<F> ReceiverLoss for F
where
    F: Fn(&Tensor, &Tensor) -> Result<Tensor, SignalError>,
{
    fn loss(&self, out_probs: &Tensor, target: &Tensor) -> Result<Tensor, SignalError> {
        self(out_probs, target)
    }
}

/// Loss of the next-symbol predictor.
pub trait PredictorLoss {
    /// `logits` and `soft_targets` are `(rows, n_symbols)`.
    fn loss(
        &self,
        logits: &Tensor,
        soft_targets: &Tensor,
        ignore_index: Option<u32>,
    ) -> Result<Tensor, SignalError>;
}

impl<F> PredictorLoss for F
where
    F: Fn(&Tensor, &Tensor, Option<u32>) -> Result<Tensor, SignalError>,
{
    fn loss(
        &self,
        logits: &Tensor,
        soft_targets: &Tensor,
        ignore_index: Option<u32>,
    ) -> Result<Tensor, SignalError> {
        self(logits, soft_targets, ignore_index)
    }
}

/// Categorical cross-entropy on the receiver output.
///
/// The receiver's `out_probs` are fed as scores to a log-softmax.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyReceiverLoss;

impl ReceiverLoss for CrossEntropyReceiverLoss {
    fn loss(&self, out_probs: &Tensor, target: &Tensor) -> Result<Tensor, SignalError> {
        candle_nn::loss::cross_entropy(out_probs, target)
            .map_err(tensor_err("CrossEntropyReceiverLoss"))
    }
}

/// Cross-entropy against soft (or one-hot) target distributions.
///
/// Per row: `-Σ_k target[k] · log_softmax(logits)[k]`, averaged over rows.
/// With an ignore index, rows whose target argmax equals it are left out of
/// both the sum and the count; if every row is ignored the loss is zero.
///
/// # Example
///
/// ```
/// use candle_core::{Device, Tensor};
/// use signal_soft::losses::{PredictorLoss, SoftCrossEntropy};
///
/// let logits = Tensor::new(&[[0.0f32, 0.0], [0.0, 0.0]], &Device::Cpu).unwrap();
/// let targets = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &Device::Cpu).unwrap();
/// let loss = SoftCrossEntropy.loss(&logits, &targets, None).unwrap();
/// let v = loss.to_scalar::<f32>().unwrap();
/// assert!((v - std::f32::consts::LN_2).abs() < 1e-5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftCrossEntropy;

impl PredictorLoss for SoftCrossEntropy {
    fn loss(
        &self,
        logits: &Tensor,
        soft_targets: &Tensor,
        ignore_index: Option<u32>,
    ) -> Result<Tensor, SignalError> {
        let map_err = tensor_err("SoftCrossEntropy");
        let log_p = candle_nn::ops::log_softmax(logits, D::Minus1).map_err(&map_err)?;
        let per_row = (soft_targets * &log_p)
            .and_then(|t| t.sum(D::Minus1))
            .and_then(|t| t.neg())
            .map_err(&map_err)?;

        let Some(ignored) = ignore_index else {
            return per_row.mean_all().map_err(map_err);
        };

        let classes = soft_targets
            .argmax(D::Minus1)
            .and_then(|t| t.to_vec1::<u32>())
            .map_err(&map_err)?;
        let keep: Vec<f32> = classes
            .iter()
            .map(|&c| if c == ignored { 0.0 } else { 1.0 })
            .collect();
        let kept = keep.iter().filter(|&&k| k > 0.0).count();
        if kept == 0 {
            return Tensor::new(0f32, logits.device())
                .and_then(|t| t.to_dtype(per_row.dtype()))
                .map_err(map_err);
        }

        let keep = Tensor::from_vec(keep, classes.len(), logits.device())
            .and_then(|t| t.to_dtype(per_row.dtype()))
            .map_err(&map_err)?;
        (&per_row * &keep)
            .and_then(|t| t.sum_all())
            .and_then(|t| t / kept as f64)
            .map_err(map_err)
    }
}

/// Combines the receiver loss with an optional weighted predictor loss.
///
/// Returns `receiver_loss` unchanged when there is no predictor term.
///
/// # Errors
///
/// Returns [`SignalError::Tensor`] if the scalars live on different devices
/// or have incompatible dtypes.
pub fn compose_loss(
    receiver_loss: &Tensor,
    predictor: Option<(&Tensor, f64)>,
) -> Result<Tensor, SignalError> {
    let map_err = tensor_err("compose_loss");
    match predictor {
        None => Ok(receiver_loss.clone()),
        Some((predictor_loss, weight)) => {
            let weighted = (predictor_loss * weight).map_err(&map_err)?;
            (receiver_loss + &weighted).map_err(map_err)
        }
    }
}

/// Scalar twin of [`compose_loss`], used for logged values.
///
/// # Example
///
/// ```
/// use signal_soft::losses::compose_scalar;
///
/// assert_eq!(compose_scalar(2.0, Some((1.0, 0.5))), 2.5);
/// assert_eq!(compose_scalar(2.0, None), 2.0);
/// ```
pub fn compose_scalar(receiver_loss: f32, predictor: Option<(f32, f64)>) -> f32 {
    match predictor {
        None => receiver_loss,
        Some((predictor_loss, weight)) => receiver_loss + (weight as f32) * predictor_loss,
    }
}
