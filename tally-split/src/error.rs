use rust_decimal::Decimal;
use tally_core::{ParseEnumError, UserId};
use thiserror::Error;

/// Result alias for split creation.
pub type SplitResult<T> = Result<T, SplitError>;

/// Validation failures raised while computing shares or building a split.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("a split needs at least two participants, got {count}")]
    InsufficientParticipants { count: usize },
    #[error("total amount must be positive, got {0}")]
    NonPositiveTotal(Decimal),
    #[error("participant {user_id} has a negative amount {amount}")]
    NegativeAmount { user_id: UserId, amount: Decimal },
    #[error("participant {0} has no amount")]
    MissingAmount(UserId),
    #[error("participant {user_id} has a negative percentage {percentage}")]
    NegativePercentage {
        user_id: UserId,
        percentage: Decimal,
    },
    #[error("participant {0} has no percentage")]
    MissingPercentage(UserId),
    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(UserId),
    #[error("participants owe {owed} which exceeds the total {total}")]
    SharesExceedTotal { owed: Decimal, total: Decimal },
    #[error("shares do not match the total: {0}")]
    TotalMismatch(String),
    #[error("share arithmetic overflowed for total {total}")]
    AmountOverflow { total: Decimal },
    #[error(transparent)]
    UnsupportedMethod(#[from] ParseEnumError),
}
