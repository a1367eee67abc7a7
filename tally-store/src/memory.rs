use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tally_core::{Group, GroupId, NewSplit, SplitExpense, SplitId, UserId, UserProfile};
use tally_ledger::{LedgerEntry, LedgerQuery, LedgerRepository, LedgerResult};
use tracing::debug;

use crate::{SplitRepository, SplitTransaction, StoreError, StoreResult};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    splits: Vec<SplitExpense>,
    profiles: HashMap<UserId, UserProfile>,
    groups: HashMap<GroupId, Group>,
    journal: Vec<LedgerEntry>,
}

impl MemoryState {
    fn split_index(&self, id: &SplitId) -> StoreResult<usize> {
        self.splits
            .iter()
            .position(|split| &split.id == id)
            .ok_or_else(|| StoreError::not_found("split", id))
    }
}

/// Process-local repository used by tests and embedded callers.
///
/// Transactions run one at a time behind a mutex against a private copy of the
/// state; the copy replaces the shared state only when the transaction succeeds.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerRepository for MemoryRepository {
    fn latest_sequence(&self) -> LedgerResult<Option<u64>> {
        Ok(self.state.lock().journal.last().map(|entry| entry.sequence))
    }

    fn query(&self, query: LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
        let state = self.state.lock();
        let mut entries: Vec<LedgerEntry> = state
            .journal
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        if !query.ascending {
            entries.reverse();
        }
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

impl SplitRepository for MemoryRepository {
    fn create_split(&self, split: NewSplit) -> StoreResult<SplitExpense> {
        let expense = split.into_expense(SplitId::generate(), Utc::now());
        let mut state = self.state.lock();
        state.splits.push(expense.clone());
        debug!(split_id = %expense.id, "split stored in memory");
        Ok(expense)
    }

    fn get_split(&self, id: &SplitId) -> StoreResult<SplitExpense> {
        let state = self.state.lock();
        let idx = state.split_index(id)?;
        Ok(state.splits[idx].clone())
    }

    fn splits_for_user(&self, user_id: &UserId) -> StoreResult<Vec<SplitExpense>> {
        let state = self.state.lock();
        Ok(state
            .splits
            .iter()
            .filter(|split| split.involves(user_id))
            .cloned()
            .collect())
    }

    fn splits_for_group(&self, group_id: &GroupId) -> StoreResult<Vec<SplitExpense>> {
        let state = self.state.lock();
        Ok(state
            .splits
            .iter()
            .filter(|split| split.group_id.as_ref() == Some(group_id))
            .cloned()
            .collect())
    }

    fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let mut state = self.state.lock();
        if state.profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict(format!(
                "profile '{}' already exists",
                profile.id
            )));
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn get_profile(&self, id: &UserId) -> StoreResult<UserProfile> {
        self.state
            .lock()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("profile", id))
    }

    fn create_group(&self, group: Group) -> StoreResult<Group> {
        let mut state = self.state.lock();
        if state.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!(
                "group '{}' already exists",
                group.id
            )));
        }
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    fn get_group(&self, id: &GroupId) -> StoreResult<Group> {
        self.state
            .lock()
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id))
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn SplitTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self.state.lock();
        let mut working = guard.clone();
        let value = f(&mut MemoryTransaction {
            state: &mut working,
        })?;
        *guard = working;
        Ok(value)
    }
}

struct MemoryTransaction<'a> {
    state: &'a mut MemoryState,
}

impl SplitTransaction for MemoryTransaction<'_> {
    fn load_split(&mut self, id: &SplitId) -> StoreResult<SplitExpense> {
        let idx = self.state.split_index(id)?;
        Ok(self.state.splits[idx].clone())
    }

    fn save_split(&mut self, split: &SplitExpense) -> StoreResult<()> {
        let idx = self.state.split_index(&split.id)?;
        let stored = &mut self.state.splits[idx];
        stored.participants = split.participants.clone();
        stored.updated_at = split.updated_at;
        Ok(())
    }

    fn load_profile(&mut self, id: &UserId) -> StoreResult<UserProfile> {
        self.state
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("profile", id))
    }

    fn save_profile(&mut self, profile: &UserProfile) -> StoreResult<()> {
        let stored = self
            .state
            .profiles
            .get_mut(&profile.id)
            .ok_or_else(|| StoreError::not_found("profile", &profile.id))?;
        stored.wallet = profile.wallet.clone();
        Ok(())
    }

    fn append_entries(&mut self, entries: Vec<LedgerEntry>) -> StoreResult<Vec<LedgerEntry>> {
        let mut next = self
            .state
            .journal
            .last()
            .map(|entry| entry.sequence)
            .unwrap_or(0);
        let mut stored = Vec::with_capacity(entries.len());
        for entry in entries {
            next += 1;
            let entry = entry.with_sequence(next);
            self.state.journal.push(entry.clone());
            stored.push(entry);
        }
        Ok(stored)
    }
}
