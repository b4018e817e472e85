//! Train/eval mode carried explicitly by every network.
//!
//! Networks hold a [`ModeFlag`] and expose it through their contract instead
//! of relying on ambient state. The flag uses a `Cell` so that a scope guard
//! can flip it while the same networks are borrowed for a forward pass.

use std::cell::Cell;

/// The two modes a network can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkMode {
    /// Stochastic regularization active, straight-through estimators on.
    #[default]
    Train,
    /// Deterministic forward pass for validation.
    Eval,
}

impl NetworkMode {
    /// Returns `true` for [`NetworkMode::Train`].
    pub fn is_train(self) -> bool {
        matches!(self, Self::Train)
    }
}

/// Interior-mutable holder for a [`NetworkMode`].
///
/// Starts in [`NetworkMode::Train`].
///
/// # Example
///
/// ```
/// use signal_core::{ModeFlag, NetworkMode};
///
/// let flag = ModeFlag::default();
/// assert_eq!(flag.get(), NetworkMode::Train);
/// flag.set(NetworkMode::Eval);
/// assert_eq!(flag.get(), NetworkMode::Eval);
/// ```
#[derive(Debug, Default)]
pub struct ModeFlag(Cell<NetworkMode>);

impl ModeFlag {
    pub fn new(mode: NetworkMode) -> Self {
        Self(Cell::new(mode))
    }

    pub fn get(&self) -> NetworkMode {
        self.0.get()
    }

    pub fn set(&self, mode: NetworkMode) {
        self.0.set(mode);
    }
}
