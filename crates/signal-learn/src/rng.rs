//! Deterministic PRNG for dataset generation.
//!
//! splitmix64: tiny, seedable, and identical across platforms, so a seed in
//! `Hparams` reproduces the same games everywhere.

/// Deterministic PRNG based on splitmix64.
///
/// # Example
///
/// ```
/// use signal_learn::rng::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let idx = rng.next_below(3);
/// assert!(idx < 3);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleRng(u64);

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform index in `[0, n)`. Returns 0 when `n` is 0.
    pub fn next_below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }

    /// `k` distinct indices from `[0, n)` in random order (partial Fisher-Yates).
    ///
    /// `k` is clamped to `n`.
    pub fn choose_distinct(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = i + self.next_below(n - i);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }
}
