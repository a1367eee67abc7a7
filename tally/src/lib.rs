//! Tally: shared-expense splitting, balance netting and settlement.
//!
//! This crate re-exports the workspace members under one roof.

pub use tally_balance as balance;
pub use tally_config as config;
pub use tally_core as domain;
pub use tally_events as events;
pub use tally_ledger as ledger;
pub use tally_settlement as settlement;
pub use tally_split as split;
pub use tally_store as store;

pub mod prelude {
    pub use tally_balance::{net_balance, BalanceSheet, NetBalance};
    pub use tally_core::{CurrencyCode, SplitExpense, SplitId, UserId, UserProfile};
    pub use tally_settlement::{SettlementError, SettlementService};
    pub use tally_split::{MismatchPolicy, Sharer, SplitDraft};
    pub use tally_store::{MemoryRepository, SplitRepository, SqliteRepository};
}
