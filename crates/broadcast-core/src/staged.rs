//! Values settable before a session exists.

/// A property that is either waiting for the next session or already
/// applied to the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged<T> {
    /// Set before initiation; applied when a session is created.
    Pending(T),

    /// Applied to the live session.
    Applied(T),
}

impl<T> Staged<T> {
    /// Current value, applied or not.
    pub fn value(&self) -> &T {
        match self {
            Self::Pending(value) | Self::Applied(value) => value,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Record a new value. With a live session the caller applies it right
    /// away, so it is stored as applied.
    pub fn set(&mut self, value: T, live: bool) {
        *self = if live {
            Self::Applied(value)
        } else {
            Self::Pending(value)
        };
    }
}

impl<T: Default> Staged<T> {
    /// Mark the value applied and return it. Called once at initiation.
    pub fn resolve(&mut self) -> &T {
        self.transition(Staged::Applied);
        self.value()
    }

    /// Return the value to pending so the next session applies it again.
    pub fn reset(&mut self) {
        self.transition(Staged::Pending);
    }

    fn transition(&mut self, into: fn(T) -> Self) {
        let value = match self {
            Self::Pending(value) | Self::Applied(value) => std::mem::take(value),
        };
        *self = into(value);
    }
}

impl<T: Default> Default for Staged<T> {
    fn default() -> Self {
        Self::Pending(T::default())
    }
}
