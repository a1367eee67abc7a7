use crate::{LedgerEntry, LedgerQuery, LedgerResult};

/// Read access to a durable wallet journal.
///
/// Entries are appended by the store inside the same transaction that moves
/// the balances, so this trait only exposes the read side.
pub trait LedgerRepository: Send + Sync {
    /// Read the latest persisted sequence value.
    fn latest_sequence(&self) -> LedgerResult<Option<u64>>;

    /// Load entries matching the supplied query.
    fn query(&self, query: LedgerQuery) -> LedgerResult<Vec<LedgerEntry>>;
}
