//! Conflict resolution engine.

use crate::error::{LedgerError, LedgerResult};
use larder_model::{Resolution, ResolutionStrategy, Syncable};

/// A caller-supplied field-merge function.
///
/// Given the local edit and the persisted state, produces the merged
/// entity. Only the caller's domain logic knows which fields merge
/// safely; numeric and textual fields have different semantics.
pub type MergeFn<E> = Box<dyn Fn(&E, &E) -> E + Send + Sync>;

/// Source of resolution decisions when a conflict surfaces.
///
/// Implementations typically front a UI dialog or an application
/// policy. Returning `None` defers: the record stays unsynced and
/// nothing is overwritten.
pub trait ConflictHandler<E>: Send + Sync {
    /// Returns the strategy to apply, or `None` to defer the decision.
    fn decide(&self, mine: &E, theirs: &E) -> Option<ResolutionStrategy>;
}

/// The default handler: always defers.
///
/// Surfacing a conflict is treated as strictly better than silently
/// overwriting either side.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferAll;

impl<E> ConflictHandler<E> for DeferAll {
    fn decide(&self, _mine: &E, _theirs: &E) -> Option<ResolutionStrategy> {
        None
    }
}

/// Applies resolution strategies to conflicting entity pairs.
///
/// The resolver is constructed once per entity type; supplying a merge
/// function is optional, and requesting [`ResolutionStrategy::Merge`]
/// without one is a typed error rather than a guess.
pub struct ConflictResolver<E> {
    merge: Option<MergeFn<E>>,
}

impl<E: Syncable + Clone> ConflictResolver<E> {
    /// Creates a resolver without merge support.
    #[must_use]
    pub fn new() -> Self {
        Self { merge: None }
    }

    /// Creates a resolver with a caller-supplied merge function.
    pub fn with_merge(merge: impl Fn(&E, &E) -> E + Send + Sync + 'static) -> Self {
        Self {
            merge: Some(Box::new(merge)),
        }
    }

    /// Returns true if this resolver can apply
    /// [`ResolutionStrategy::Merge`].
    #[must_use]
    pub fn supports_merge(&self) -> bool {
        self.merge.is_some()
    }

    /// Applies `strategy` to the conflicting pair.
    ///
    /// - `KeepMine`: `mine`'s field values with `theirs`' version
    ///   token, so the next optimistic check succeeds.
    /// - `KeepTheirs`: `theirs` unchanged.
    /// - `Merge`: the supplied merge function, with `theirs`' token
    ///   adopted the same way as `KeepMine`.
    /// - `Cancel`: no entity; the save attempt is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnsupportedStrategy`] if `Merge` is
    /// requested and no merge function was supplied.
    pub fn resolve(
        &self,
        mine: &E,
        theirs: &E,
        strategy: ResolutionStrategy,
    ) -> LedgerResult<Resolution<E>> {
        match strategy {
            ResolutionStrategy::KeepMine => {
                let mut resolved = mine.clone();
                resolved.set_version_token(theirs.version_token().cloned());
                Ok(Resolution::settled(resolved, ResolutionStrategy::KeepMine))
            }
            ResolutionStrategy::KeepTheirs => Ok(Resolution::settled(
                theirs.clone(),
                ResolutionStrategy::KeepTheirs,
            )),
            ResolutionStrategy::Merge => match &self.merge {
                Some(merge) => {
                    let mut resolved = merge(mine, theirs);
                    resolved.set_version_token(theirs.version_token().cloned());
                    Ok(Resolution::settled(resolved, ResolutionStrategy::Merge))
                }
                None => Err(LedgerError::UnsupportedStrategy {
                    strategy: ResolutionStrategy::Merge,
                }),
            },
            ResolutionStrategy::Cancel => Ok(Resolution::abandoned()),
        }
    }

    /// Consults `handler` for a decision and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConflictUnresolved`] if the handler
    /// defers; the affected record stays Pending or Failed and nothing
    /// is overwritten.
    pub fn settle_with(
        &self,
        handler: &dyn ConflictHandler<E>,
        mine: &E,
        theirs: &E,
    ) -> LedgerResult<Resolution<E>> {
        match handler.decide(mine, theirs) {
            Some(strategy) => self.resolve(mine, theirs, strategy),
            None => Err(LedgerError::ConflictUnresolved {
                entity_id: mine.entity_id().to_string(),
            }),
        }
    }
}

impl<E: Syncable + Clone> Default for ConflictResolver<E> {
    fn default() -> Self {
        Self::new()
    }
}
