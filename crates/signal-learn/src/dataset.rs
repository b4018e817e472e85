//! Synthetic attribute game.
//!
//! Every item is a `(color, shape, x, y)` tuple placed on a coarse grid.
//! A sample draws `n_candidates` items with pairwise distinct
//! `(color, shape)` classes, picks one as the target, and shows it to the
//! sender. The receiver sees all candidates in their drawn order.
//!
//! Items are encoded as concatenated one-hot blocks:
//! `[color | shape | x cell | y cell]`.

use candle_core::{Device, Tensor};
use signal_core::SignalError;
use signal_soft::training::GameBatch;

use crate::rng::SimpleRng;

pub const COLORS: [&str; 5] = ["red", "green", "blue", "yellow", "white"];
pub const SHAPES: [&str; 3] = ["circle", "square", "triangle"];

/// Size and layout of a generated dataset.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Number of games (default: 1000).
    pub n_samples: usize,

    /// Candidates shown to the receiver, target included (default: 3).
    pub n_candidates: usize,

    /// Side of the picture the items are placed on (default: 32).
    pub picture_size: usize,

    /// Side of one item; positions snap to multiples of it (default: 8).
    pub shape_size: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            n_candidates: 3,
            picture_size: 32,
            shape_size: 8,
        }
    }
}

impl DatasetConfig {
    /// Grid cells per axis.
    pub fn grid_cells(&self) -> usize {
        if self.shape_size == 0 {
            0
        } else {
            self.picture_size / self.shape_size
        }
    }

    /// Width of one encoded item.
    pub fn feature_dim(&self) -> usize {
        COLORS.len() + SHAPES.len() + 2 * self.grid_cells()
    }

    fn validate(&self) -> Result<(), SignalError> {
        let classes = COLORS.len() * SHAPES.len();
        if self.n_candidates == 0 || self.n_candidates > classes {
            return Err(SignalError::Dataset {
                message: format!(
                    "n_candidates must be in 1..={classes}, got {}",
                    self.n_candidates
                ),
            });
        }
        if self.grid_cells() == 0 {
            return Err(SignalError::Dataset {
                message: format!(
                    "picture_size {} holds no item of size {}",
                    self.picture_size, self.shape_size
                ),
            });
        }
        Ok(())
    }
}

/// One object in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeItem {
    pub color: usize,
    pub shape: usize,
    /// Grid cell, not pixels.
    pub x: usize,
    pub y: usize,
}

impl AttributeItem {
    /// `(color, shape)` class index in `0..COLORS.len() * SHAPES.len()`.
    pub fn class(&self) -> usize {
        self.color * SHAPES.len() + self.shape
    }

    /// Human-readable name, e.g. `"blue triangle"`.
    pub fn label(&self) -> String {
        format!("{} {}", COLORS[self.color], SHAPES[self.shape])
    }

    fn encode_into(&self, grid_cells: usize, out: &mut Vec<f32>) {
        let start = out.len();
        out.resize(start + COLORS.len() + SHAPES.len() + 2 * grid_cells, 0.0);
        out[start + self.color] = 1.0;
        out[start + COLORS.len() + self.shape] = 1.0;
        let pos = start + COLORS.len() + SHAPES.len();
        out[pos + self.x] = 1.0;
        out[pos + grid_cells + self.y] = 1.0;
    }
}

/// One game: candidates plus the index of the sender's item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSample {
    pub candidates: Vec<AttributeItem>,
    pub target: usize,
}

impl GameSample {
    /// The item the sender observes.
    pub fn sender_item(&self) -> &AttributeItem {
        &self.candidates[self.target]
    }
}

/// A fixed set of generated games.
#[derive(Debug, Clone)]
pub struct AttributeGameDataset {
    config: DatasetConfig,
    samples: Vec<GameSample>,
}

impl AttributeGameDataset {
    /// Generates `config.n_samples` games from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Dataset`] if more candidates are requested
    /// than there are distinct classes, or the grid is empty.
    pub fn generate(config: &DatasetConfig, seed: u64) -> Result<Self, SignalError> {
        config.validate()?;
        let mut rng = SimpleRng::new(seed);
        let cells = config.grid_cells();
        let n_classes = COLORS.len() * SHAPES.len();

        let samples = (0..config.n_samples)
            .map(|_| {
                let target = rng.next_below(config.n_candidates);
                let candidates = rng
                    .choose_distinct(n_classes, config.n_candidates)
                    .into_iter()
                    .map(|class| AttributeItem {
                        color: class / SHAPES.len(),
                        shape: class % SHAPES.len(),
                        x: rng.next_below(cells),
                        y: rng.next_below(cells),
                    })
                    .collect();
                GameSample { candidates, target }
            })
            .collect();

        tracing::debug!(
            samples = config.n_samples,
            candidates = config.n_candidates,
            feature_dim = config.feature_dim(),
            seed,
            "generated attribute game dataset"
        );
        Ok(Self {
            config: config.clone(),
            samples,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn samples(&self) -> &[GameSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn feature_dim(&self) -> usize {
        self.config.feature_dim()
    }

    /// Moves the last `ceil(len × fraction)` samples into a second dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Dataset`] if `fraction` is outside `[0, 1)`.
    pub fn split_off(&mut self, fraction: f64) -> Result<Self, SignalError> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(SignalError::Dataset {
                message: format!("split fraction must be in [0, 1), got {fraction}"),
            });
        }
        let held = ((self.samples.len() as f64) * fraction).ceil() as usize;
        let at = self.samples.len() - held.min(self.samples.len());
        Ok(Self {
            config: self.config.clone(),
            samples: self.samples.split_off(at),
        })
    }

    /// Encodes the samples as consecutive batches; the last one may be short.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Dataset`] for a zero batch size and
    /// [`SignalError::Tensor`] if tensor construction fails.
    pub fn batches(&self, batch_size: usize, device: &Device) -> Result<Vec<GameBatch>, SignalError> {
        if batch_size == 0 {
            return Err(SignalError::Dataset {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        self.samples
            .chunks(batch_size)
            .map(|chunk| encode_batch(chunk, &self.config, device))
            .collect()
    }
}

fn encode_batch(
    samples: &[GameSample],
    config: &DatasetConfig,
    device: &Device,
) -> Result<GameBatch, SignalError> {
    let map_err = |e: candle_core::Error| SignalError::Tensor {
        message: format!("encode_batch: {e}"),
    };
    let cells = config.grid_cells();
    let features = config.feature_dim();
    let batch = samples.len();

    let mut sender = Vec::with_capacity(batch * features);
    let mut candidates = Vec::with_capacity(batch * config.n_candidates * features);
    let mut targets = Vec::with_capacity(batch);
    for sample in samples {
        sample.sender_item().encode_into(cells, &mut sender);
        for item in &sample.candidates {
            item.encode_into(cells, &mut candidates);
        }
        targets.push(sample.target as u32);
    }

    Ok(GameBatch::new(
        Tensor::from_vec(sender, (batch, features), device).map_err(map_err)?,
        Tensor::from_vec(candidates, (batch, config.n_candidates, features), device)
            .map_err(map_err)?,
        Tensor::from_vec(targets, batch, device).map_err(map_err)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> DatasetConfig {
        DatasetConfig {
            n_samples: 50,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn candidates_have_distinct_classes() {
        let ds = AttributeGameDataset::generate(&small(), 42).unwrap();
        for sample in ds.samples() {
            let mut classes: Vec<usize> = sample.candidates.iter().map(|c| c.class()).collect();
            classes.sort_unstable();
            classes.dedup();
            assert_eq!(classes.len(), 3);
            assert!(sample.target < 3);
        }
    }

    #[test]
    fn same_seed_same_games() {
        let a = AttributeGameDataset::generate(&small(), 7).unwrap();
        let b = AttributeGameDataset::generate(&small(), 7).unwrap();
        let c = AttributeGameDataset::generate(&small(), 8).unwrap();
        assert_eq!(a.samples(), b.samples());
        assert_ne!(a.samples(), c.samples());
    }

    #[test]
    fn too_many_candidates_rejected() {
        let config = DatasetConfig {
            n_candidates: COLORS.len() * SHAPES.len() + 1,
            ..small()
        };
        assert!(matches!(
            AttributeGameDataset::generate(&config, 0),
            Err(SignalError::Dataset { .. })
        ));
    }

    #[test]
    fn encoding_is_four_one_hot_blocks() {
        let item = AttributeItem {
            color: 2,
            shape: 1,
            x: 3,
            y: 0,
        };
        let mut out = Vec::new();
        item.encode_into(4, &mut out);
        assert_eq!(out.len(), 5 + 3 + 8);
        assert_eq!(out.iter().filter(|&&v| v == 1.0).count(), 4);
        assert_eq!(out[2], 1.0);
        assert_eq!(out[5 + 1], 1.0);
        assert_eq!(out[8 + 3], 1.0);
        assert_eq!(out[12], 1.0);
        assert_eq!(item.label(), "blue square");
    }

    #[test]
    fn batches_have_expected_shapes() {
        let ds = AttributeGameDataset::generate(&small(), 1).unwrap();
        let batches = ds.batches(16, &Device::Cpu).unwrap();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].sender_input.dims(), &[16, 16]);
        assert_eq!(batches[0].candidates.dims(), &[16, 3, 16]);
        assert_eq!(batches[3].batch_size(), 2);
    }

    #[test]
    fn sender_input_matches_target_candidate() {
        let ds = AttributeGameDataset::generate(&small(), 5).unwrap();
        let batch = &ds.batches(8, &Device::Cpu).unwrap()[0];
        let sender: Vec<Vec<f32>> = batch.sender_input.to_vec2().unwrap();
        let candidates: Vec<Vec<Vec<f32>>> = batch.candidates.to_vec3().unwrap();
        let targets: Vec<u32> = batch.target.to_vec1().unwrap();
        for b in 0..8 {
            assert_eq!(sender[b], candidates[b][targets[b] as usize]);
        }
    }

    #[test]
    fn split_holds_out_tail() {
        let mut train = AttributeGameDataset::generate(&small(), 1).unwrap();
        let tail = train.samples()[45..].to_vec();
        let val = train.split_off(0.1).unwrap();
        assert_eq!(train.len(), 45);
        assert_eq!(val.samples(), tail.as_slice());
        assert!(train.split_off(1.0).is_err());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let ds = AttributeGameDataset::generate(&small(), 1).unwrap();
        assert!(ds.batches(0, &Device::Cpu).is_err());
    }
}
