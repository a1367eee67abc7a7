use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tally_core::{
    CurrencyCode, SettlementChannel, SettlementStatus, SplitExpense, SplitId, UserId, UserProfile,
};
use tally_events::{Event, EventBus, ParticipantStatusEvent, SplitCreatedEvent, WalletEvent};
use tally_ledger::{settlement_reference, LedgerEntry, WalletLedger};
use tally_split::{MismatchPolicy, SplitDraft, SplitWarning};
use tally_store::{SplitRepository, SplitTransaction};
use tracing::{info, warn};

use crate::machine::{transition, ActorRole, SettlementAction};
use crate::{SettlementError, SettlementResult};

/// A freshly persisted split and the findings its draft produced.
#[derive(Clone, Debug)]
pub struct CreatedSplit {
    pub split: SplitExpense,
    pub warnings: Vec<SplitWarning>,
}

/// Result of one committed transition.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    pub split: SplitExpense,
    pub participant_id: UserId,
    pub from: SettlementStatus,
    pub to: SettlementStatus,
    pub journal: Vec<LedgerEntry>,
}

/// Drives participants through the settlement lifecycle.
///
/// Every transition runs inside one repository transaction that re-reads the
/// participant's current status, checks the precondition and writes the new
/// state together with any wallet movement. A caller that loses a race gets
/// `InvalidStateTransition`; nothing is retried here.
pub struct SettlementService<R> {
    repo: Arc<R>,
    events: Option<Arc<EventBus>>,
    mismatch_policy: MismatchPolicy,
}

impl<R: SplitRepository> SettlementService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            events: None,
            mismatch_policy: MismatchPolicy::default(),
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Validate and persist a split. No write happens when validation fails.
    pub fn create_split(&self, draft: &SplitDraft) -> SettlementResult<CreatedSplit> {
        let outcome = draft.build(self.mismatch_policy)?;
        let split = self.repo.create_split(outcome.split)?;
        info!(
            split_id = %split.id,
            paid_by = %split.paid_by,
            currency = %split.currency,
            total = %split.total_amount,
            participants = split.participants.len(),
            "split created"
        );
        self.publish(Event::SplitCreated(SplitCreatedEvent {
            split: split.clone(),
        }));
        Ok(CreatedSplit {
            split,
            warnings: outcome.warnings,
        })
    }

    /// Instant settlement: move `amount_owed` from the debtor's wallet to the
    /// payer's and mark the participant settled, all in one transaction.
    pub fn settle_with_wallet(
        &self,
        split_id: &SplitId,
        participant_id: &UserId,
    ) -> SettlementResult<TransitionOutcome> {
        self.run(
            split_id,
            participant_id,
            participant_id,
            SettlementAction::SettleWithWallet,
        )
    }

    /// Manual settlement, step one: the debtor claims to have paid off-app.
    pub fn request_approval(
        &self,
        split_id: &SplitId,
        actor: &UserId,
    ) -> SettlementResult<TransitionOutcome> {
        self.run(split_id, actor, actor, SettlementAction::RequestApproval)
    }

    /// The payer confirms an off-app payment. No wallet movement.
    pub fn approve(
        &self,
        split_id: &SplitId,
        participant_id: &UserId,
        actor: &UserId,
    ) -> SettlementResult<TransitionOutcome> {
        self.run(split_id, participant_id, actor, SettlementAction::Approve)
    }

    /// The payer denies an off-app payment; the participant can request again.
    pub fn reject(
        &self,
        split_id: &SplitId,
        participant_id: &UserId,
        actor: &UserId,
    ) -> SettlementResult<TransitionOutcome> {
        self.run(split_id, participant_id, actor, SettlementAction::Reject)
    }

    /// External top-up of a user's wallet.
    pub fn add_funds(
        &self,
        user_id: &UserId,
        amount: Decimal,
        currency: &CurrencyCode,
        reference_id: &str,
    ) -> SettlementResult<UserProfile> {
        let (profile, entry) = self.repo.transaction(|tx| -> SettlementResult<_> {
            let mut profile = tx.load_profile(user_id)?;
            let entry = WalletLedger::add_funds(&mut profile, currency, amount, reference_id)?;
            tx.save_profile(&profile)?;
            let mut stored = tx.append_entries(vec![entry])?;
            Ok((profile, stored.remove(0)))
        })?;
        info!(user = %user_id, %currency, %amount, sequence = entry.sequence, "wallet topped up");
        self.publish(Event::WalletCredited(WalletEvent {
            user_id: user_id.clone(),
            currency: currency.clone(),
            amount,
            balance: profile.wallet.balance(currency),
        }));
        Ok(profile)
    }

    fn run(
        &self,
        split_id: &SplitId,
        participant_id: &UserId,
        actor: &UserId,
        action: SettlementAction,
    ) -> SettlementResult<TransitionOutcome> {
        let result = self
            .repo
            .transaction(|tx| apply(tx, split_id, participant_id, actor, action));
        match result {
            Ok(outcome) => {
                info!(
                    split_id = %split_id,
                    participant = %participant_id,
                    %actor,
                    %action,
                    from = %outcome.from,
                    to = %outcome.to,
                    "settlement transition committed"
                );
                self.publish_transition(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    split_id = %split_id,
                    participant = %participant_id,
                    %actor,
                    %action,
                    reason = err.code(),
                    error = %err,
                    "settlement transition refused"
                );
                Err(err)
            }
        }
    }

    fn publish_transition(&self, outcome: &TransitionOutcome) {
        if self.events.is_none() {
            return;
        }
        self.publish(Event::ParticipantStatusChanged(ParticipantStatusEvent {
            split_id: outcome.split.id.clone(),
            participant_id: outcome.participant_id.clone(),
            paid_by: outcome.split.paid_by.clone(),
            from: outcome.from,
            to: outcome.to,
        }));
        for entry in &outcome.journal {
            let balance = entry
                .meta
                .as_ref()
                .and_then(|meta| meta.get("balance_after"))
                .and_then(|value| value.as_str())
                .and_then(|value| value.parse::<Decimal>().ok())
                .unwrap_or_default();
            let event = WalletEvent {
                user_id: entry.user_id.clone(),
                currency: entry.currency.clone(),
                amount: entry.amount.abs(),
                balance,
            };
            self.publish(if entry.amount < Decimal::ZERO {
                Event::WalletDebited(event)
            } else {
                Event::WalletCredited(event)
            });
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

fn apply(
    tx: &mut dyn SplitTransaction,
    split_id: &SplitId,
    participant_id: &UserId,
    actor: &UserId,
    action: SettlementAction,
) -> SettlementResult<TransitionOutcome> {
    let mut split = tx.load_split(split_id)?;

    let allowed = match action.required_role() {
        ActorRole::Payer => actor == &split.paid_by,
        ActorRole::Debtor => actor == participant_id,
    };
    if !allowed {
        return Err(SettlementError::Unauthorized {
            actor: actor.clone(),
            action,
            split_id: split_id.clone(),
        });
    }

    let participant = split
        .participant(participant_id)
        .ok_or_else(|| SettlementError::ParticipantNotFound {
            split_id: split_id.clone(),
            participant_id: participant_id.clone(),
        })?;
    let from = participant.settlement_status;
    let amount_owed = participant.amount_owed;
    let to = transition(from, action).map_err(|illegal| SettlementError::InvalidStateTransition {
        split_id: split_id.clone(),
        participant_id: participant_id.clone(),
        from: illegal.from,
        action: illegal.action,
    })?;

    let mut journal = Vec::new();
    if action == SettlementAction::SettleWithWallet {
        let mut debtor = tx.load_profile(participant_id)?;
        let mut payer = tx.load_profile(&split.paid_by)?;
        let lines = WalletLedger::transfer(
            &mut debtor,
            &mut payer,
            &split.currency,
            amount_owed,
            &settlement_reference(split_id, participant_id),
        )?;
        if !lines.is_empty() {
            tx.save_profile(&debtor)?;
            tx.save_profile(&payer)?;
            journal = tx.append_entries(lines)?;
        }
    }

    let now = Utc::now();
    if let Some(entry) = split.participant_mut(participant_id) {
        entry.settlement_status = to;
        if to == SettlementStatus::Settled {
            entry.settled_at = Some(now);
            entry.settled_via = Some(match action {
                SettlementAction::SettleWithWallet => SettlementChannel::Wallet,
                _ => SettlementChannel::Manual,
            });
        }
    }
    split.updated_at = now;
    tx.save_split(&split)?;

    Ok(TransitionOutcome {
        split,
        participant_id: participant_id.clone(),
        from,
        to,
        journal,
    })
}
