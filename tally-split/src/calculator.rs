use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{round_money, SplitMethod, UserId};

use crate::{SplitError, SplitResult};

const MIN_PARTICIPANTS: usize = 2;

/// Raw per-participant input as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInput {
    pub user_id: UserId,
    pub raw_amount: Option<Decimal>,
    pub raw_percentage: Option<Decimal>,
}

impl ShareInput {
    pub fn equal(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            raw_amount: None,
            raw_percentage: None,
        }
    }

    pub fn amount(user_id: impl Into<UserId>, amount: Decimal) -> Self {
        Self {
            raw_amount: Some(amount),
            ..Self::equal(user_id)
        }
    }

    pub fn percentage(user_id: impl Into<UserId>, percentage: Decimal) -> Self {
        Self {
            raw_percentage: Some(percentage),
            ..Self::equal(user_id)
        }
    }
}

/// Validated share for one participant, rounded to two decimals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedShare {
    pub user_id: UserId,
    pub amount_owed: Decimal,
    pub percentage: Option<Decimal>,
}

/// Compute each participant's share of `total`.
///
/// The input order is preserved. Equal shares are rounded independently, so
/// the sum may drift from the total by up to one cent per participant; the
/// drift is left as-is. Amount and percentage inputs are not required to add
/// up to the total.
pub fn compute_shares(
    total: Decimal,
    method: SplitMethod,
    participants: &[ShareInput],
) -> SplitResult<Vec<ComputedShare>> {
    if participants.len() < MIN_PARTICIPANTS {
        return Err(SplitError::InsufficientParticipants {
            count: participants.len(),
        });
    }
    if total <= Decimal::ZERO {
        return Err(SplitError::NonPositiveTotal(total));
    }
    let mut seen = HashSet::with_capacity(participants.len());
    for input in participants {
        if !seen.insert(&input.user_id) {
            return Err(SplitError::DuplicateParticipant(input.user_id.clone()));
        }
    }

    match method {
        SplitMethod::Equally => Ok(equal_shares(total, participants)),
        SplitMethod::ByAmount => participants.iter().map(amount_share).collect(),
        SplitMethod::ByPercentage => participants
            .iter()
            .map(|input| percentage_share(total, input))
            .collect(),
    }
}

fn equal_shares(total: Decimal, participants: &[ShareInput]) -> Vec<ComputedShare> {
    let share = round_money(total / Decimal::from(participants.len() as u64));
    participants
        .iter()
        .map(|input| ComputedShare {
            user_id: input.user_id.clone(),
            amount_owed: share,
            percentage: None,
        })
        .collect()
}

fn amount_share(input: &ShareInput) -> SplitResult<ComputedShare> {
    let amount = input
        .raw_amount
        .ok_or_else(|| SplitError::MissingAmount(input.user_id.clone()))?;
    if amount < Decimal::ZERO {
        return Err(SplitError::NegativeAmount {
            user_id: input.user_id.clone(),
            amount,
        });
    }
    Ok(ComputedShare {
        user_id: input.user_id.clone(),
        amount_owed: round_money(amount),
        percentage: None,
    })
}

fn percentage_share(total: Decimal, input: &ShareInput) -> SplitResult<ComputedShare> {
    let percentage = input
        .raw_percentage
        .ok_or_else(|| SplitError::MissingPercentage(input.user_id.clone()))?;
    if percentage < Decimal::ZERO {
        return Err(SplitError::NegativePercentage {
            user_id: input.user_id.clone(),
            percentage,
        });
    }
    let owed = total
        .checked_mul(percentage)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(SplitError::AmountOverflow { total })?;
    Ok(ComputedShare {
        user_id: input.user_id.clone(),
        amount_owed: round_money(owed),
        percentage: Some(percentage),
    })
}
