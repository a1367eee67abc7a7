use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::{CurrencyCode, UserId};
use uuid::Uuid;

/// Journal record describing a single wallet balance delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub currency: CurrencyCode,
    pub amount: Decimal,
    pub entry_type: LedgerType,
    pub reference_id: String,
    pub meta: Option<serde_json::Value>,
}

impl LedgerEntry {
    /// Creates a new ledger entry with a zero sequence number.
    pub fn new(
        user_id: UserId,
        currency: CurrencyCode,
        amount: Decimal,
        entry_type: LedgerType,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            user_id,
            currency,
            amount,
            entry_type,
            reference_id: reference_id.into(),
            meta: None,
        }
    }

    /// Assign the monotonic sequence number used for replay.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Enumerates the supported wallet movements.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    /// External funding. Increases the total held across all wallets.
    TopUp,
    SettlementDebit,
    SettlementCredit,
}

impl LedgerType {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerType::TopUp => "top_up",
            LedgerType::SettlementDebit => "settlement_debit",
            LedgerType::SettlementCredit => "settlement_credit",
        }
    }
}

impl fmt::Display for LedgerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_up" => Ok(LedgerType::TopUp),
            "settlement_debit" => Ok(LedgerType::SettlementDebit),
            "settlement_credit" => Ok(LedgerType::SettlementCredit),
            other => Err(format!("unknown ledger type: {other}")),
        }
    }
}
