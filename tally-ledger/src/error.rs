use rust_decimal::Decimal;
use tally_core::{CurrencyCode, UserId, WalletError};
use thiserror::Error;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "{user_id} has insufficient {currency} funds: requested {requested}, available {available}"
    )]
    InsufficientFunds {
        user_id: UserId,
        currency: CurrencyCode,
        requested: Decimal,
        available: Decimal,
    },
    #[error("invalid amount {0}")]
    InvalidAmount(Decimal),
    #[error("crediting {amount} {currency} to {user_id} overflows the balance {balance}")]
    Overflow {
        user_id: UserId,
        currency: CurrencyCode,
        balance: Decimal,
        amount: Decimal,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid ledger state: {0}")]
    InvalidState(String),
}

impl LedgerError {
    pub(crate) fn from_wallet(user_id: &UserId, err: WalletError) -> Self {
        match err {
            WalletError::InsufficientFunds {
                currency,
                requested,
                available,
            } => Self::InsufficientFunds {
                user_id: user_id.clone(),
                currency,
                requested,
                available,
            },
            WalletError::InvalidAmount(amount) => Self::InvalidAmount(amount),
            WalletError::Overflow {
                currency,
                balance,
                amount,
            } => Self::Overflow {
                user_id: user_id.clone(),
                currency,
                balance,
                amount,
            },
            WalletError::NegativeBalance { currency, balance } => Self::InvalidState(format!(
                "{user_id} holds a negative {currency} balance {balance}"
            )),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
