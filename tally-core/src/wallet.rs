use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CurrencyCode;

/// Failures raised by wallet balance mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("insufficient {currency} funds: requested {requested}, available {available}")]
    InsufficientFunds {
        currency: CurrencyCode,
        requested: Decimal,
        available: Decimal,
    },
    #[error("invalid amount {0}: wallet movements must be non-negative")]
    InvalidAmount(Decimal),
    #[error("negative balance {balance} for {currency}")]
    NegativeBalance {
        currency: CurrencyCode,
        balance: Decimal,
    },
    #[error("crediting {amount} to a {currency} balance of {balance} overflows")]
    Overflow {
        currency: CurrencyCode,
        balance: Decimal,
        amount: Decimal,
    },
}

/// Per-currency, never-negative balance map owned by a user profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CurrencyCode, Decimal>",
    into = "BTreeMap<CurrencyCode, Decimal>"
)]
pub struct Wallet {
    balances: BTreeMap<CurrencyCode, Decimal>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance held in `currency`, zero when the currency was never credited.
    pub fn balance(&self, currency: &CurrencyCode) -> Decimal {
        self.balances
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, currency: &CurrencyCode) -> bool {
        self.balances.contains_key(currency)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, &Decimal)> {
        self.balances.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Add `amount` to the balance, initializing the currency when absent.
    /// Returns the new balance. Leaves the wallet untouched on failure.
    pub fn credit(
        &mut self,
        currency: &CurrencyCode,
        amount: Decimal,
    ) -> Result<Decimal, WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance = self.balance(currency);
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::Overflow {
                currency: currency.clone(),
                balance,
                amount,
            })?;
        self.balances.insert(currency.clone(), updated);
        Ok(updated)
    }

    /// Remove `amount` from the balance. Leaves the wallet untouched on failure.
    pub fn debit(
        &mut self,
        currency: &CurrencyCode,
        amount: Decimal,
    ) -> Result<Decimal, WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }
        let available = self.balance(currency);
        if amount > available {
            return Err(WalletError::InsufficientFunds {
                currency: currency.clone(),
                requested: amount,
                available,
            });
        }
        if amount.is_zero() {
            return Ok(available);
        }
        let remaining = available - amount;
        self.balances.insert(currency.clone(), remaining);
        Ok(remaining)
    }
}

impl TryFrom<BTreeMap<CurrencyCode, Decimal>> for Wallet {
    type Error = WalletError;

    fn try_from(balances: BTreeMap<CurrencyCode, Decimal>) -> Result<Self, Self::Error> {
        let negative = balances.iter().find(|(_, value)| **value < Decimal::ZERO);
        if let Some((currency, balance)) = negative {
            return Err(WalletError::NegativeBalance {
                currency: currency.clone(),
                balance: *balance,
            });
        }
        Ok(Self { balances })
    }
}

impl From<Wallet> for BTreeMap<CurrencyCode, Decimal> {
    fn from(value: Wallet) -> Self {
        value.balances
    }
}
