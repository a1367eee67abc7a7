//! Fixtures shared by the integration tests of the Tally crates.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use tally_core::{
    CurrencyCode, Group, GroupId, NewSplit, SettlementStatus, SplitExpense, SplitId, SplitMethod,
    SplitParticipant, UserId, UserProfile,
};
use tally_split::{Sharer, SplitDraft};
use tally_store::{MemoryRepository, SplitRepository};

/// Parse a currency code, panicking on fixtures that are not valid codes.
pub fn currency(code: &str) -> CurrencyCode {
    code.parse()
        .unwrap_or_else(|err| panic!("invalid fixture currency '{code}': {err}"))
}

pub fn usd() -> CurrencyCode {
    currency("USD")
}

pub fn eur() -> CurrencyCode {
    currency("EUR")
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// `"alice"` becomes `"Alice"`.
pub fn display_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Create one empty-wallet profile per id.
pub fn seed_profiles<R: SplitRepository>(repo: &R, ids: &[&str]) -> Result<()> {
    for id in ids {
        repo.create_profile(UserProfile::new(*id, display_name(id)))
            .with_context(|| format!("failed to seed profile {id}"))?;
    }
    Ok(())
}

pub fn seed_group<R: SplitRepository>(repo: &R, id: &str, members: &[&str]) -> Result<Group> {
    let group = Group::new(id, display_name(id), members.iter().map(|member| user(member)));
    repo.create_group(group)
        .with_context(|| format!("failed to seed group {id}"))
}

/// In-memory repository with the given profiles already present.
pub fn seeded_memory(ids: &[&str]) -> Result<Arc<MemoryRepository>> {
    let repo = MemoryRepository::new();
    seed_profiles(&repo, ids)?;
    Ok(Arc::new(repo))
}

/// Draft dividing `total` equally among `sharers`.
pub fn equal_draft(
    paid_by: &str,
    currency: CurrencyCode,
    total: Decimal,
    sharers: &[&str],
) -> SplitDraft {
    sharers.iter().fold(
        SplitDraft::new(paid_by, currency, SplitMethod::Equally, total),
        |draft, id| draft.with_sharer(Sharer::new(*id, display_name(id))),
    )
}

/// By-amount draft whose total is the sum of the given shares.
pub fn amount_draft(
    paid_by: &str,
    currency: CurrencyCode,
    shares: &[(&str, Decimal)],
) -> SplitDraft {
    let total = shares.iter().map(|(_, amount)| *amount).sum();
    shares.iter().fold(
        SplitDraft::new(paid_by, currency, SplitMethod::ByAmount, total),
        |draft, (id, amount)| {
            draft.with_sharer(Sharer::new(*id, display_name(id)).with_amount(*amount))
        },
    )
}

/// Builds [`SplitExpense`] values directly, bypassing validation and storage.
///
/// Useful for aggregator tests that need exact participant states.
#[derive(Clone, Debug)]
pub struct SplitBuilder {
    id: SplitId,
    paid_by: UserId,
    currency: CurrencyCode,
    participants: Vec<SplitParticipant>,
    group_id: Option<GroupId>,
}

impl SplitBuilder {
    pub fn new(id: &str, paid_by: &str, currency: CurrencyCode) -> Self {
        Self {
            id: SplitId::from(id),
            paid_by: user(paid_by),
            currency,
            participants: Vec::new(),
            group_id: None,
        }
    }

    pub fn owes(self, id: &str, amount: Decimal) -> Self {
        self.participant(id, amount, SettlementStatus::Unsettled)
    }

    pub fn pending(self, id: &str, amount: Decimal) -> Self {
        self.participant(id, amount, SettlementStatus::PendingApproval)
    }

    pub fn settled(self, id: &str, amount: Decimal) -> Self {
        self.participant(id, amount, SettlementStatus::Settled)
    }

    pub fn in_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(GroupId::from(group_id));
        self
    }

    pub fn build(self) -> SplitExpense {
        let total_amount = self
            .participants
            .iter()
            .map(|participant| participant.amount_owed)
            .sum();
        NewSplit {
            original_expense_id: None,
            description: None,
            currency: self.currency,
            split_method: SplitMethod::ByAmount,
            total_amount,
            paid_by: self.paid_by,
            payer_share: Decimal::ZERO,
            participants: self.participants,
            group_id: self.group_id,
        }
        .into_expense(self.id, Utc::now())
    }

    fn participant(mut self, id: &str, amount: Decimal, status: SettlementStatus) -> Self {
        self.participants.push(SplitParticipant {
            user_id: user(id),
            display_name: display_name(id),
            email: None,
            amount_owed: amount,
            percentage: None,
            settlement_status: status,
            settled_at: None,
            settled_via: None,
        });
        self
    }
}
