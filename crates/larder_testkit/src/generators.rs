//! Property-based test generators using proptest.

use larder_model::OperationKind;
use proptest::prelude::*;

/// One scripted step against a ledger.
///
/// Entity indices address a small pool of IDs so scripts collide on the
/// same coalescing keys often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Track a mutation of the indexed entity.
    Track(OperationKind, u8),
    /// Mark the oldest unsynced record as pushed.
    SyncOldest,
    /// Record a failed push for the oldest unsynced record.
    FailOldest,
    /// Purge every record of the indexed entity.
    PurgeEntity(u8),
}

/// Formats a pool index as an entity ID.
#[must_use]
pub fn entity_id(index: u8) -> String {
    format!("e-{index}")
}

/// Strategy for operation kinds.
pub fn operation_kind_strategy() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Create),
        Just(OperationKind::Update),
        Just(OperationKind::Delete),
    ]
}

/// Strategy for a single scripted step over a pool of five entities.
pub fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        4 => (operation_kind_strategy(), 0..5u8).prop_map(|(kind, e)| LedgerOp::Track(kind, e)),
        2 => Just(LedgerOp::SyncOldest),
        1 => Just(LedgerOp::FailOldest),
        1 => (0..5u8).prop_map(LedgerOp::PurgeEntity),
    ]
}

/// Strategy for a script of up to `max_steps` steps.
pub fn ledger_script_strategy(max_steps: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    prop::collection::vec(ledger_op_strategy(), 0..max_steps)
}
