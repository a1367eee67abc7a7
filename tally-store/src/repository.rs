use tally_core::{Group, GroupId, NewSplit, SplitExpense, SplitId, UserId, UserProfile};
use tally_ledger::{LedgerEntry, LedgerRepository};

use crate::{StoreError, StoreResult};

/// Reads and writes visible to a single atomic unit of work.
///
/// Nothing written through a transaction is visible to other callers until the
/// closure passed to [`SplitRepository::transaction`] returns `Ok`.
pub trait SplitTransaction {
    fn load_split(&mut self, id: &SplitId) -> StoreResult<SplitExpense>;

    /// Persist the mutable parts of an existing split (participants and `updated_at`).
    fn save_split(&mut self, split: &SplitExpense) -> StoreResult<()>;

    fn load_profile(&mut self, id: &UserId) -> StoreResult<UserProfile>;

    /// Persist an existing profile's wallet.
    fn save_profile(&mut self, profile: &UserProfile) -> StoreResult<()>;

    /// Append journal lines, returning them with their assigned sequence numbers.
    fn append_entries(&mut self, entries: Vec<LedgerEntry>) -> StoreResult<Vec<LedgerEntry>>;
}

/// Abstraction over durable split storage engines.
pub trait SplitRepository: LedgerRepository {
    /// Persist a new split, assigning its id and timestamps.
    fn create_split(&self, split: NewSplit) -> StoreResult<SplitExpense>;

    fn get_split(&self, id: &SplitId) -> StoreResult<SplitExpense>;

    /// Every split where the user is the payer or a participant, oldest first.
    fn splits_for_user(&self, user_id: &UserId) -> StoreResult<Vec<SplitExpense>>;

    /// Every split scoped to the group, oldest first.
    fn splits_for_group(&self, group_id: &GroupId) -> StoreResult<Vec<SplitExpense>>;

    fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;

    fn get_profile(&self, id: &UserId) -> StoreResult<UserProfile>;

    fn create_group(&self, group: Group) -> StoreResult<Group>;

    fn get_group(&self, id: &GroupId) -> StoreResult<Group>;

    /// Run `f` atomically. Writes are committed only when `f` returns `Ok`.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn SplitTransaction) -> Result<T, E>,
        E: From<StoreError>;
}
