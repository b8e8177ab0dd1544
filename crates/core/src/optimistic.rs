//! Optimistic boolean writes with rollback.
//!
//! A write is begun by applying the new value in memory and capturing the
//! value it replaced. Once persistence answers, the write is settled: on
//! failure the captured value is restored. Reverting to the value captured
//! at begin time (not the original one) keeps interleaved writes to the
//! same key last-write-wins.

/// An in-flight optimistic write on key `K`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an optimistic write must be settled"]
pub struct OptimisticWrite<K> {
    key: K,
    previous: bool,
    next: bool,
}

impl<K> OptimisticWrite<K> {
    /// Write that flips `previous`.
    pub fn flip(key: K, previous: bool) -> Self {
        Self {
            key,
            previous,
            next: !previous,
        }
    }

    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[must_use]
    pub fn previous(&self) -> bool {
        self.previous
    }

    #[must_use]
    pub fn next(&self) -> bool {
        self.next
    }

    /// The value to restore if the write failed, `None` if it succeeded.
    #[must_use]
    pub fn rollback_value<E>(&self, result: &Result<(), E>) -> Option<bool> {
        result.is_err().then_some(self.previous)
    }

    pub fn into_key(self) -> K {
        self.key
    }
}

/// How an optimistic write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Persisted; the in-memory value is the new one.
    Persisted { completed: bool },
    /// Persistence failed; the in-memory value was restored.
    Reverted { completed: bool },
    /// No signed-in user; nothing changed.
    Ignored,
}

impl WriteOutcome {
    #[must_use]
    pub fn is_persisted(self) -> bool {
        matches!(self, WriteOutcome::Persisted { .. })
    }

    /// In-memory value after the write, if any write happened.
    #[must_use]
    pub fn completed(self) -> Option<bool> {
        match self {
            WriteOutcome::Persisted { completed } | WriteOutcome::Reverted { completed } => {
                Some(completed)
            }
            WriteOutcome::Ignored => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_captures_previous_value() {
        let write = OptimisticWrite::flip("card", false);
        assert!(write.next());
        assert!(!write.previous());
        assert_eq!(*write.key(), "card");
    }

    #[test]
    fn rollback_only_on_failure() {
        let write = OptimisticWrite::flip(1, true);
        assert_eq!(write.rollback_value::<()>(&Ok(())), None);
        assert_eq!(write.rollback_value(&Err("boom")), Some(true));
    }

    #[test]
    fn outcome_reports_value() {
        assert_eq!(WriteOutcome::Reverted { completed: false }.completed(), Some(false));
        assert_eq!(WriteOutcome::Ignored.completed(), None);
        assert!(WriteOutcome::Persisted { completed: true }.is_persisted());
    }
}
