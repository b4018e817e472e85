//! Message packing: per-sequence effective lengths.
//!
//! ## Algorithm
//!
//! 1. Argmax over the symbol axis gives a `(max_len, batch)` index grid
//! 2. For each sequence, find the first stop symbol at position `i`
//! 3. Effective length is `i + 1` (stop symbol included), or `max_len` if none
//!
//! Lengths are kept in batch order; consumers must not assume they are sorted.

use candle_core::{IndexOp, Tensor};
use signal_core::{SignalError, STOP_SYMBOL};

use crate::message::Message;
use crate::nn::tensor_err;

/// A message annotated with the valid length of each sequence.
///
/// # Example
///
/// ```
/// use candle_core::Device;
/// use signal_soft::{pack, Message};
///
/// let msg = Message::from_symbols(&[vec![2, 0, 1], vec![1, 1, 2]], 3, &Device::Cpu).unwrap();
/// let packed = pack(&msg, 3).unwrap();
/// assert_eq!(packed.lengths(), &[2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct PackedMessage {
    data: Tensor,
    lengths: Vec<usize>,
    mask: Tensor,
    max_len: usize,
}

impl PackedMessage {
    /// The original `(max_len, batch, n_symbols)` message data, unreordered.
    pub fn data(&self) -> &Tensor {
        &self.data
    }

    /// Effective length of each sequence, in batch order.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// `(msg_len, batch)` mask in the message dtype: `1.0` where `t < lengths[b]`.
    pub fn mask(&self) -> &Tensor {
        &self.mask
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Message data with every position past the effective length zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if the broadcast multiply fails.
    pub fn masked_data(&self) -> Result<Tensor, SignalError> {
        let map_err = tensor_err("PackedMessage::masked_data");
        let mask = self.mask.unsqueeze(2).map_err(&map_err)?;
        self.data.broadcast_mul(&mask).map_err(map_err)
    }

    /// Picks, for each sequence, the row at its last valid timestep.
    ///
    /// `per_step` is any time-major `(msg_len, batch, features)` tensor
    /// computed from this message (e.g. recurrent hidden states). Output:
    /// `(batch, features)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if `per_step` is shorter than a length.
    pub fn last_valid_step(&self, per_step: &Tensor) -> Result<Tensor, SignalError> {
        let map_err = tensor_err("PackedMessage::last_valid_step");
        let rows = self
            .lengths
            .iter()
            .enumerate()
            .map(|(b, &len)| per_step.i((len.saturating_sub(1), b)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(&map_err)?;
        Tensor::stack(&rows, 0).map_err(map_err)
    }
}

/// Effective lengths for batch-major symbol rows.
///
/// Only the first `max_len` positions of each row are scanned.
///
/// # Example
///
/// ```
/// use signal_soft::packer::effective_lengths;
///
/// let rows = vec![vec![1, 2, 0, 0, 1], vec![1, 1, 1, 1, 1]];
/// assert_eq!(effective_lengths(&rows, 5), vec![3, 5]);
/// ```
pub fn effective_lengths(rows: &[Vec<u32>], max_len: usize) -> Vec<usize> {
    rows.iter()
        .map(|row| {
            row.iter()
                .take(max_len)
                .position(|&s| s == STOP_SYMBOL)
                .map_or(max_len, |i| i + 1)
        })
        .collect()
}

/// Packs a message, truncating each sequence after its first stop symbol.
///
/// Pure function of the tensor values. A sequence with no stop symbol keeps
/// the full `max_len`.
///
/// # Errors
///
/// Returns [`SignalError::Tensor`] if the argmax or mask construction fails.
pub fn pack(message: &Message, max_len: usize) -> Result<PackedMessage, SignalError> {
    let map_err = tensor_err("pack");
    let rows = message.symbols()?;
    let lengths = effective_lengths(&rows, max_len);

    let steps = message.msg_len();
    let batch = message.batch_size();
    let mut mask = Vec::with_capacity(steps * batch);
    for t in 0..steps {
        for &len in &lengths {
            mask.push(if t < len { 1.0f32 } else { 0.0 });
        }
    }
    let mask = Tensor::from_vec(mask, (steps, batch), message.device())
        .and_then(|m| m.to_dtype(message.tensor().dtype()))
        .map_err(map_err)?;

    Ok(PackedMessage {
        data: message.tensor().clone(),
        lengths,
        mask,
        max_len,
    })
}
