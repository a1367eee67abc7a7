use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CurrencyCode, GroupId, SplitId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// How the total of a split is divided among its sharers. Fixed at creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Equally,
    ByAmount,
    ByPercentage,
}

impl SplitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitMethod::Equally => "equally",
            SplitMethod::ByAmount => "by_amount",
            SplitMethod::ByPercentage => "by_percentage",
        }
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equally" | "equal" => Ok(SplitMethod::Equally),
            "by_amount" | "byAmount" | "amount" => Ok(SplitMethod::ByAmount),
            "by_percentage" | "byPercentage" | "percentage" => Ok(SplitMethod::ByPercentage),
            other => Err(ParseEnumError {
                kind: "split method",
                value: other.to_string(),
            }),
        }
    }
}

/// Settlement lifecycle of one participant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Unsettled,
    PendingApproval,
    Settled,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementStatus::Unsettled => "unsettled",
            SettlementStatus::PendingApproval => "pending_approval",
            SettlementStatus::Settled => "settled",
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, SettlementStatus::Settled)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsettled" => Ok(SettlementStatus::Unsettled),
            "pending_approval" => Ok(SettlementStatus::PendingApproval),
            "settled" => Ok(SettlementStatus::Settled),
            other => Err(ParseEnumError {
                kind: "settlement status",
                value: other.to_string(),
            }),
        }
    }
}

/// Path through which a participant reached `settled`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementChannel {
    Wallet,
    Manual,
}

/// One debtor's stake in a split expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitParticipant {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount_owed: Decimal,
    #[serde(default)]
    pub percentage: Option<Decimal>,
    pub settlement_status: SettlementStatus,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settled_via: Option<SettlementChannel>,
}

impl SplitParticipant {
    pub fn is_settled(&self) -> bool {
        self.settlement_status.is_settled()
    }
}

/// Validated split ready to be persisted. The repository assigns the id and timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSplit {
    pub original_expense_id: Option<String>,
    pub description: Option<String>,
    pub currency: CurrencyCode,
    pub split_method: SplitMethod,
    pub total_amount: Decimal,
    pub paid_by: UserId,
    pub payer_share: Decimal,
    pub participants: Vec<SplitParticipant>,
    pub group_id: Option<GroupId>,
}

impl NewSplit {
    pub fn into_expense(self, id: SplitId, now: DateTime<Utc>) -> SplitExpense {
        let mut involved_user_ids: BTreeSet<UserId> = self
            .participants
            .iter()
            .map(|participant| participant.user_id.clone())
            .collect();
        involved_user_ids.insert(self.paid_by.clone());
        SplitExpense {
            id,
            original_expense_id: self.original_expense_id,
            description: self.description,
            currency: self.currency,
            split_method: self.split_method,
            total_amount: self.total_amount,
            paid_by: self.paid_by,
            payer_share: self.payer_share,
            participants: self.participants,
            group_id: self.group_id,
            involved_user_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One persisted cost-sharing event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitExpense {
    pub id: SplitId,
    pub original_expense_id: Option<String>,
    pub description: Option<String>,
    pub currency: CurrencyCode,
    pub split_method: SplitMethod,
    pub total_amount: Decimal,
    pub paid_by: UserId,
    pub payer_share: Decimal,
    pub participants: Vec<SplitParticipant>,
    pub group_id: Option<GroupId>,
    pub involved_user_ids: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SplitExpense {
    pub fn participant(&self, user_id: &UserId) -> Option<&SplitParticipant> {
        self.participants
            .iter()
            .find(|participant| &participant.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut SplitParticipant> {
        self.participants
            .iter_mut()
            .find(|participant| &participant.user_id == user_id)
    }

    pub fn involves(&self, user_id: &UserId) -> bool {
        self.involved_user_ids.contains(user_id)
    }

    pub fn is_group_split(&self) -> bool {
        self.group_id.is_some()
    }

    /// True once every participant has settled. Derived, never stored.
    pub fn is_fully_settled(&self) -> bool {
        self.participants.iter().all(SplitParticipant::is_settled)
    }

    /// Sum of the amounts still owed to the payer.
    pub fn outstanding_amount(&self) -> Decimal {
        self.participants
            .iter()
            .filter(|participant| !participant.is_settled())
            .map(|participant| participant.amount_owed)
            .sum()
    }

    /// Sum of every participant's share, settled or not.
    pub fn owed_total(&self) -> Decimal {
        self.participants
            .iter()
            .map(|participant| participant.amount_owed)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn participant(id: &str, owed: Decimal, status: SettlementStatus) -> SplitParticipant {
        SplitParticipant {
            user_id: UserId::from(id),
            display_name: id.to_uppercase(),
            email: None,
            amount_owed: owed,
            percentage: None,
            settlement_status: status,
            settled_at: None,
            settled_via: None,
        }
    }

    fn sample() -> SplitExpense {
        NewSplit {
            original_expense_id: None,
            description: Some("dinner".into()),
            currency: "USD".parse().unwrap(),
            split_method: SplitMethod::Equally,
            total_amount: dec!(90),
            paid_by: UserId::from("alice"),
            payer_share: dec!(30),
            participants: vec![
                participant("bob", dec!(30), SettlementStatus::Settled),
                participant("carol", dec!(30), SettlementStatus::PendingApproval),
            ],
            group_id: None,
        }
        .into_expense(SplitId::from("s1"), Utc::now())
    }

    #[test]
    fn involved_users_include_payer() {
        let split = sample();
        let ids: Vec<&str> = split.involved_user_ids.iter().map(UserId::as_str).collect();
        assert_eq!(ids, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn derived_settlement_predicates() {
        let mut split = sample();
        assert!(!split.is_fully_settled());
        assert_eq!(split.outstanding_amount(), dec!(30));
        split
            .participant_mut(&UserId::from("carol"))
            .unwrap()
            .settlement_status = SettlementStatus::Settled;
        assert!(split.is_fully_settled());
        assert_eq!(split.outstanding_amount(), Decimal::ZERO);
        assert_eq!(split.owed_total(), dec!(60));
    }

    #[test]
    fn enums_roundtrip_through_text() {
        for method in [
            SplitMethod::Equally,
            SplitMethod::ByAmount,
            SplitMethod::ByPercentage,
        ] {
            assert_eq!(method.as_str().parse::<SplitMethod>().unwrap(), method);
        }
        assert_eq!(
            "byPercentage".parse::<SplitMethod>().unwrap(),
            SplitMethod::ByPercentage
        );
        assert!("shares".parse::<SplitMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&SettlementStatus::PendingApproval).unwrap(),
            "\"pending_approval\""
        );
    }
}
