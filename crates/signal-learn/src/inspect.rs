//! Looking at what the agents say.
//!
//! Decoded messages and symbol counts for a fixed probe batch, logged at the
//! end of an epoch to watch a protocol form.

use signal_core::SignalError;
use signal_soft::packer::effective_lengths;
use signal_soft::training::{GameBatch, SignallingGame};
use signal_soft::Message;

/// Argmax symbols per sequence, cut after the first stop symbol (kept).
///
/// # Errors
///
/// Returns [`SignalError::Tensor`] if the argmax fails.
pub fn decode_messages(message: &Message) -> Result<Vec<Vec<u32>>, SignalError> {
    let mut rows = message.symbols()?;
    let lengths = effective_lengths(&rows, message.msg_len());
    for (row, len) in rows.iter_mut().zip(lengths) {
        row.truncate(len);
    }
    Ok(rows)
}

/// Occurrences of each symbol over the valid positions of every sequence.
///
/// The result has one entry per vocabulary symbol.
///
/// # Errors
///
/// Returns [`SignalError::Tensor`] if decoding fails.
pub fn symbol_frequencies(message: &Message) -> Result<Vec<usize>, SignalError> {
    let mut counts = vec![0usize; message.n_symbols()];
    for row in decode_messages(message)? {
        for sym in row {
            if let Some(c) = counts.get_mut(sym as usize) {
                *c += 1;
            }
        }
    }
    Ok(counts)
}

/// `[1, 2, 0]` → `"1-2-0"`.
pub fn format_message(symbols: &[u32]) -> String {
    symbols
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("-")
}

/// Messages the sender produces for `probe` in eval mode, with their counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReport {
    pub messages: Vec<Vec<u32>>,
    pub frequencies: Vec<usize>,
}

/// Runs the sender on `probe` in evaluation mode and logs the messages.
///
/// `labels`, if given, names each probe item in the log lines.
///
/// # Errors
///
/// Propagates sender and decoding errors.
pub fn log_message_samples(
    game: &SignallingGame,
    probe: &GameBatch,
    labels: &[String],
    epoch: usize,
) -> Result<MessageReport, SignalError> {
    let report = game.evaluation_scope(|g| {
        let input = probe
            .sender_input
            .to_device(g.device())
            .map_err(|e| SignalError::Tensor {
                message: format!("log_message_samples: {e}"),
            })?;
        let message = g.sender().forward(&input)?.detach();
        Ok(MessageReport {
            messages: decode_messages(&message)?,
            frequencies: symbol_frequencies(&message)?,
        })
    })?;

    for (i, msg) in report.messages.iter().enumerate() {
        let label = labels.get(i).map(String::as_str).unwrap_or("?");
        tracing::info!(
            target: "signal::messages",
            epoch,
            item = label,
            message = %format_message(msg),
            "sample"
        );
    }
    tracing::info!(
        target: "signal::messages",
        epoch,
        frequencies = ?report.frequencies,
        "symbol frequencies"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn message() -> Message {
        let rows = vec![vec![1, 2, 0, 2, 1], vec![2, 2, 2, 2, 2], vec![0, 1, 1, 1, 1]];
        Message::from_symbols(&rows, 3, &Device::Cpu).unwrap()
    }

    #[test]
    fn decode_stops_after_first_stop() {
        let decoded = decode_messages(&message()).unwrap();
        assert_eq!(decoded, vec![vec![1, 2, 0], vec![2, 2, 2, 2, 2], vec![0]]);
    }

    #[test]
    fn frequencies_count_valid_positions_only() {
        assert_eq!(symbol_frequencies(&message()).unwrap(), vec![2, 1, 6]);
    }

    #[test]
    fn format_joins_with_dashes() {
        assert_eq!(format_message(&[1, 2, 0]), "1-2-0");
        assert_eq!(format_message(&[]), "");
    }
}
