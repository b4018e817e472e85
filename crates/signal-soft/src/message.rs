//! The message a sender emits.
//!
//! A message is a `(msg_len, batch, n_symbols)` tensor: one distribution (or
//! one-hot vector) over the vocabulary per timestep and batch element. Symbol
//! [`STOP_SYMBOL`](signal_core::STOP_SYMBOL) ends the meaningful content.

use candle_core::{Device, Tensor, D};
use signal_core::SignalError;

use crate::nn::{one_hot, tensor_err};

/// Time-major message tensor of shape `(msg_len, batch, n_symbols)`.
///
/// # Example
///
/// ```
/// use candle_core::Device;
/// use signal_soft::Message;
///
/// // Two sequences of length 3 over a 3-symbol vocabulary (batch-major input).
/// let msg = Message::from_symbols(&[vec![1, 0, 2], vec![2, 2, 1]], 3, &Device::Cpu).unwrap();
/// assert_eq!(msg.msg_len(), 3);
/// assert_eq!(msg.batch_size(), 2);
/// assert_eq!(msg.symbols().unwrap(), vec![vec![1, 0, 2], vec![2, 2, 1]]);
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    tensor: Tensor,
    msg_len: usize,
    batch_size: usize,
    n_symbols: usize,
}

impl Message {
    /// Wraps a rank-3 time-major tensor.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if the tensor is not rank 3.
    pub fn new(tensor: Tensor) -> Result<Self, SignalError> {
        let (msg_len, batch_size, n_symbols) =
            tensor.dims3().map_err(tensor_err("Message::new"))?;
        Ok(Self {
            tensor,
            msg_len,
            batch_size,
            n_symbols,
        })
    }

    /// Builds a one-hot message from batch-major symbol rows.
    ///
    /// `rows[b][t]` is the symbol of sequence `b` at timestep `t`; all rows
    /// must have the same length.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if rows are ragged or a symbol is out
    /// of range for the tensor library.
    pub fn from_symbols(
        rows: &[Vec<u32>],
        n_symbols: usize,
        device: &Device,
    ) -> Result<Self, SignalError> {
        let map_err = tensor_err("Message::from_symbols");
        let batch = rows.len();
        let msg_len = rows.first().map_or(0, Vec::len);
        let flat: Vec<u32> = rows.iter().flatten().copied().collect();
        let indices = Tensor::from_vec(flat, (batch, msg_len), device).map_err(&map_err)?;
        let tensor = one_hot(&indices.t().map_err(&map_err)?, n_symbols)
            .map_err(&map_err)?
            .contiguous()
            .map_err(&map_err)?;
        Self::new(tensor)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn msg_len(&self) -> usize {
        self.msg_len
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn n_symbols(&self) -> usize {
        self.n_symbols
    }

    pub fn device(&self) -> &Device {
        self.tensor.device()
    }

    /// Argmax symbol per position as batch-major rows: `rows[b][t]`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if the argmax fails.
    pub fn symbols(&self) -> Result<Vec<Vec<u32>>, SignalError> {
        let map_err = tensor_err("Message::symbols");
        self.tensor
            .argmax(D::Minus1)
            .and_then(|idx| idx.t())
            .and_then(|idx| idx.to_vec2::<u32>())
            .map_err(map_err)
    }

    /// Prepends an all-zero start-of-sequence frame along the time axis.
    ///
    /// Output shape: `(msg_len + 1, batch, n_symbols)`. Frame `t + 1` holds
    /// message symbol `t`, so a causal model reading position `t` has seen
    /// exactly the symbols before `t`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if concatenation fails.
    pub fn with_start_frame(&self) -> Result<Tensor, SignalError> {
        let map_err = tensor_err("Message::with_start_frame");
        let start = Tensor::zeros(
            (1, self.batch_size, self.n_symbols),
            self.tensor.dtype(),
            self.tensor.device(),
        )
        .map_err(&map_err)?;
        Tensor::cat(&[&start, &self.tensor], 0).map_err(map_err)
    }

    /// Merges time and batch axes: `(msg_len * batch, n_symbols)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Tensor`] if the reshape fails.
    pub fn flatten_steps(&self) -> Result<Tensor, SignalError> {
        self.tensor
            .reshape((self.msg_len * self.batch_size, self.n_symbols))
            .map_err(tensor_err("Message::flatten_steps"))
    }

    /// Detached copy, used when inspecting messages outside the graph.
    pub fn detach(&self) -> Self {
        Self {
            tensor: self.tensor.detach(),
            ..*self
        }
    }
}
