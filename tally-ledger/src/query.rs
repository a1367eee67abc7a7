use chrono::{DateTime, Utc};
use tally_core::{CurrencyCode, UserId};

use crate::{LedgerEntry, LedgerType};

/// Filter describing which ledger entries to load from storage.
#[derive(Clone, Debug)]
pub struct LedgerQuery {
    pub user_id: Option<UserId>,
    pub currency: Option<CurrencyCode>,
    pub entry_type: Option<LedgerType>,
    pub reference_id: Option<String>,
    pub start_sequence: Option<u64>,
    pub end_sequence: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub ascending: bool,
}

impl Default for LedgerQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            currency: None,
            entry_type: None,
            reference_id: None,
            start_sequence: None,
            end_sequence: None,
            start_time: None,
            end_time: None,
            limit: None,
            ascending: true,
        }
    }
}

impl LedgerQuery {
    pub fn for_user(user_id: UserId) -> Self {
        Self::default().with_user(user_id)
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_type(mut self, entry_type: LedgerType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_sequence_range(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.start_sequence = start;
        self.end_sequence = end;
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Whether `entry` passes every filter except ordering and limit.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.user_id.as_ref().map_or(true, |id| &entry.user_id == id)
            && self
                .currency
                .as_ref()
                .map_or(true, |currency| &entry.currency == currency)
            && self.entry_type.map_or(true, |kind| entry.entry_type == kind)
            && self
                .reference_id
                .as_deref()
                .map_or(true, |reference| entry.reference_id == reference)
            && self.start_sequence.map_or(true, |seq| entry.sequence >= seq)
            && self.end_sequence.map_or(true, |seq| entry.sequence <= seq)
            && self.start_time.map_or(true, |ts| entry.timestamp >= ts)
            && self.end_time.map_or(true, |ts| entry.timestamp <= ts)
    }
}
