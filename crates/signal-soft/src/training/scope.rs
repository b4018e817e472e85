//! Scoped evaluation mode.
//!
//! [`EvalModeGuard::acquire`] switches a set of networks to
//! [`NetworkMode::Eval`]; dropping the guard puts each one back in the mode it
//! had at acquisition, so nested scopes leave the outer one in eval mode.
//! Release happens on every exit path: normal return, `?` propagation and
//! unwinding.

use signal_core::{ModeFlag, NetworkMode};

/// Holds a set of networks in evaluation mode for its lifetime.
///
/// # Example
///
/// ```
/// use signal_core::{ModeFlag, NetworkMode};
/// use signal_soft::training::EvalModeGuard;
///
/// let sender = ModeFlag::default();
/// let receiver = ModeFlag::default();
/// {
///     let _guard = EvalModeGuard::acquire(vec![&sender, &receiver]);
///     assert_eq!(sender.get(), NetworkMode::Eval);
/// }
/// assert_eq!(sender.get(), NetworkMode::Train);
/// assert_eq!(receiver.get(), NetworkMode::Train);
/// ```
#[must_use = "dropping the guard immediately restores the previous modes"]
pub struct EvalModeGuard<'a> {
    previous: Vec<(&'a ModeFlag, NetworkMode)>,
}

impl<'a> EvalModeGuard<'a> {
    pub fn acquire(flags: Vec<&'a ModeFlag>) -> Self {
        let previous = flags
            .into_iter()
            .map(|flag| {
                let mode = flag.get();
                flag.set(NetworkMode::Eval);
                (flag, mode)
            })
            .collect();
        Self { previous }
    }
}

impl Drop for EvalModeGuard<'_> {
    fn drop(&mut self) {
        // Reverse order so a flag listed twice ends in its original mode.
        for (flag, mode) in self.previous.iter().rev() {
            flag.set(*mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_after_early_return() {
        let flag = ModeFlag::default();
        let run = || -> Result<(), &'static str> {
            let _guard = EvalModeGuard::acquire(vec![&flag]);
            if flag.get() == NetworkMode::Eval {
                return Err("metric failed");
            }
            Ok(())
        };
        assert!(run().is_err());
        assert_eq!(flag.get(), NetworkMode::Train);
    }

    #[test]
    fn restores_after_panic() {
        let flag = ModeFlag::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = EvalModeGuard::acquire(vec![&flag]);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(flag.get(), NetworkMode::Train);
    }

    #[test]
    fn nested_guard_keeps_outer_eval() {
        let sender = ModeFlag::default();
        let receiver = ModeFlag::default();
        let outer = EvalModeGuard::acquire(vec![&sender, &receiver]);
        {
            let _inner = EvalModeGuard::acquire(vec![&sender]);
            assert_eq!(sender.get(), NetworkMode::Eval);
        }
        assert_eq!(sender.get(), NetworkMode::Eval);
        assert_eq!(receiver.get(), NetworkMode::Eval);
        drop(outer);
        assert_eq!(sender.get(), NetworkMode::Train);
        assert_eq!(receiver.get(), NetworkMode::Train);
    }

    #[test]
    fn duplicate_flag_returns_to_train() {
        let flag = ModeFlag::default();
        drop(EvalModeGuard::acquire(vec![&flag, &flag]));
        assert_eq!(flag.get(), NetworkMode::Train);
    }
}
