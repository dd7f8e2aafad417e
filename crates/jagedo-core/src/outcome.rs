//! # Command Outcomes
//!
//! Every state-changing operation reports whether it actually changed
//! anything. Replays of an already-applied transition return the current
//! record with `changed == false`; the engine skips version bumps and
//! event publication for those.

/// The result of an idempotent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    /// The record after the operation.
    pub value: T,
    /// Whether the operation changed state.
    pub changed: bool,
}

impl<T> Outcome<T> {
    /// The operation changed state.
    pub fn applied(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    /// The operation was a replay; nothing changed.
    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }

    /// Map the carried value, keeping the change flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            changed: self.changed,
        }
    }

    /// Discard the change flag.
    pub fn into_inner(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_flag() {
        let o = Outcome::unchanged(2).map(|v| v * 10);
        assert_eq!(o.value, 20);
        assert!(!o.changed);
        assert!(Outcome::applied(()).changed);
    }
}
