//! Fundamental data types shared across the entire Tally workspace.

mod currency;
mod ids;
mod money;
mod profile;
mod split;
mod wallet;

pub use currency::{CurrencyCode, CurrencyParseError};
pub use ids::{GroupId, SplitId, UserId};
pub use money::{money_tolerance, round_money, MONEY_SCALE};
pub use profile::{Group, UserProfile};
pub use split::{
    NewSplit, ParseEnumError, SettlementChannel, SettlementStatus, SplitExpense, SplitMethod,
    SplitParticipant,
};
pub use wallet::{Wallet, WalletError};
