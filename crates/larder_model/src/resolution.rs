//! Conflict settlement types.

/// Strategy for settling a detected version conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStrategy {
    /// Keep the local edit's field values.
    KeepMine,
    /// Accept the persisted (remote) state unchanged.
    KeepTheirs,
    /// Combine both sides with a caller-supplied merge function.
    Merge,
    /// Abandon the local save attempt.
    Cancel,
}

/// The outcome of applying a resolution strategy to a conflicting pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<E> {
    /// The entity to persist, if the conflict was settled.
    pub entity: Option<E>,
    /// The strategy that produced this outcome.
    pub strategy: ResolutionStrategy,
    /// True if the save attempt was abandoned.
    pub cancelled: bool,
}

impl<E> Resolution<E> {
    /// Creates a settled outcome carrying the entity to persist.
    pub fn settled(entity: E, strategy: ResolutionStrategy) -> Self {
        Self {
            entity: Some(entity),
            strategy,
            cancelled: false,
        }
    }

    /// Creates a cancelled outcome.
    #[must_use]
    pub fn abandoned() -> Self {
        Self {
            entity: None,
            strategy: ResolutionStrategy::Cancel,
            cancelled: true,
        }
    }

    /// Returns true if the outcome carries an entity to persist.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.entity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_outcome() {
        let res = Resolution::settled(42u32, ResolutionStrategy::KeepMine);
        assert!(res.is_settled());
        assert!(!res.cancelled);
        assert_eq!(res.entity, Some(42));
    }

    #[test]
    fn abandoned_outcome() {
        let res: Resolution<u32> = Resolution::abandoned();
        assert!(!res.is_settled());
        assert!(res.cancelled);
        assert_eq!(res.strategy, ResolutionStrategy::Cancel);
    }
}
