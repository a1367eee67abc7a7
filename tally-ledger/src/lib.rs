//! Wallet ledger primitives: balance movements and the journal that records them.

mod entry;
mod error;
mod ledger;
mod query;
mod repository;

pub use entry::{LedgerEntry, LedgerType};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{settlement_reference, WalletLedger};
pub use query::LedgerQuery;
pub use repository::LedgerRepository;
