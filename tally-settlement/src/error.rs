use rust_decimal::Decimal;
use tally_core::{CurrencyCode, SettlementStatus, SplitId, UserId};
use tally_ledger::LedgerError;
use tally_split::SplitError;
use tally_store::StoreError;
use thiserror::Error;

use crate::SettlementAction;

/// Result alias for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Failures surfaced by the settlement service. None of them leave a partial write.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(
        "cannot {action} participant {participant_id} of split {split_id}: status is {from}"
    )]
    InvalidStateTransition {
        split_id: SplitId,
        participant_id: UserId,
        from: SettlementStatus,
        action: SettlementAction,
    },
    #[error("{actor} is not allowed to {action} on split {split_id}")]
    Unauthorized {
        actor: UserId,
        action: SettlementAction,
        split_id: SplitId,
    },
    #[error(
        "{user_id} has insufficient {currency} funds: requested {requested}, available {available}"
    )]
    InsufficientFunds {
        user_id: UserId,
        currency: CurrencyCode,
        requested: Decimal,
        available: Decimal,
    },
    #[error("{participant_id} is not a participant of split {split_id}")]
    ParticipantNotFound {
        split_id: SplitId,
        participant_id: UserId,
    },
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// Stable machine-readable reason, suitable for picking a user-facing message.
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::InvalidStateTransition { .. } => "InvalidStateTransition",
            SettlementError::Unauthorized { .. } => "Unauthorized",
            SettlementError::InsufficientFunds { .. } => "InsufficientFunds",
            SettlementError::ParticipantNotFound { .. } => "NotFound",
            SettlementError::Split(SplitError::InsufficientParticipants { .. }) => {
                "InsufficientParticipants"
            }
            SettlementError::Split(_) => "ValidationError",
            SettlementError::Ledger(
                LedgerError::InvalidAmount(_) | LedgerError::Overflow { .. },
            ) => "ValidationError",
            SettlementError::Ledger(_) => "LedgerError",
            SettlementError::Store(err) if err.is_not_found() => "NotFound",
            SettlementError::Store(_) => "StoreError",
        }
    }

    /// Whether the caller should re-read state before deciding to try again.
    pub fn requires_refetch(&self) -> bool {
        matches!(
            self,
            SettlementError::InvalidStateTransition { .. }
                | SettlementError::InsufficientFunds { .. }
                | SettlementError::Store(_)
        )
    }
}

impl From<LedgerError> for SettlementError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientFunds {
                user_id,
                currency,
                requested,
                available,
            } => SettlementError::InsufficientFunds {
                user_id,
                currency,
                requested,
                available,
            },
            other => SettlementError::Ledger(other),
        }
    }
}
