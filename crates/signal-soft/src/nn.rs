//! Small tensor helpers shared by the agents and the game.

use candle_core::{DType, Tensor, D};
use signal_core::SignalError;

/// Wraps a candle error with the name of the operation that produced it.
pub(crate) fn tensor_err(context: &'static str) -> impl Fn(candle_core::Error) -> SignalError {
    move |e| SignalError::Tensor {
        message: format!("{context}: {e}"),
    }
}

/// One-hot encodes a tensor of `u32` class indices into `[..., depth]` f32.
pub(crate) fn one_hot(indices: &Tensor, depth: usize) -> candle_core::Result<Tensor> {
    let classes = Tensor::arange(0u32, depth as u32, indices.device())?;
    indices
        .unsqueeze(D::Minus1)?
        .broadcast_eq(&classes)?
        .to_dtype(DType::F32)
}

/// Replaces each distribution on the last axis by the one-hot of its argmax.
pub(crate) fn hard_one_hot(probs: &Tensor) -> candle_core::Result<Tensor> {
    let depth = probs.dim(D::Minus1)?;
    one_hot(&probs.argmax(D::Minus1)?, depth)
}
