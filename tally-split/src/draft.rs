use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{
    money_tolerance, CurrencyCode, GroupId, NewSplit, SettlementStatus, SplitMethod,
    SplitParticipant, UserId,
};
use tracing::warn;

use crate::{compute_shares, MismatchPolicy, ShareInput, SplitError, SplitResult, SplitWarning};

/// One person sharing the cost, with the identity fields copied onto the split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sharer {
    pub user_id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub raw_amount: Option<Decimal>,
    pub raw_percentage: Option<Decimal>,
}

impl Sharer {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: None,
            raw_amount: None,
            raw_percentage: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.raw_amount = Some(amount);
        self
    }

    pub fn with_percentage(mut self, percentage: Decimal) -> Self {
        self.raw_percentage = Some(percentage);
        self
    }

    fn input(&self) -> ShareInput {
        ShareInput {
            user_id: self.user_id.clone(),
            raw_amount: self.raw_amount,
            raw_percentage: self.raw_percentage,
        }
    }
}

/// Everything needed to create a split, before validation.
///
/// The payer may appear among the sharers; their share is recorded as
/// `payer_share` and never becomes a debt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDraft {
    pub paid_by: UserId,
    pub currency: CurrencyCode,
    pub split_method: SplitMethod,
    pub total_amount: Decimal,
    pub sharers: Vec<Sharer>,
    pub group_id: Option<GroupId>,
    pub description: Option<String>,
    pub original_expense_id: Option<String>,
}

/// Built split plus any findings the mismatch policy let through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftOutcome {
    pub split: NewSplit,
    pub warnings: Vec<SplitWarning>,
}

impl SplitDraft {
    pub fn new(
        paid_by: impl Into<UserId>,
        currency: CurrencyCode,
        split_method: SplitMethod,
        total_amount: Decimal,
    ) -> Self {
        Self {
            paid_by: paid_by.into(),
            currency,
            split_method,
            total_amount,
            sharers: Vec::new(),
            group_id: None,
            description: None,
            original_expense_id: None,
        }
    }

    pub fn with_sharer(mut self, sharer: Sharer) -> Self {
        self.sharers.push(sharer);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_original_expense(mut self, expense_id: impl Into<String>) -> Self {
        self.original_expense_id = Some(expense_id.into());
        self
    }

    /// Validate the draft and produce a split with every participant unsettled.
    pub fn build(&self, policy: MismatchPolicy) -> SplitResult<DraftOutcome> {
        let inputs: Vec<ShareInput> = self.sharers.iter().map(Sharer::input).collect();
        let shares = compute_shares(self.total_amount, self.split_method, &inputs)?;

        let mut payer_share = Decimal::ZERO;
        let mut participants = Vec::with_capacity(shares.len());
        for (sharer, share) in self.sharers.iter().zip(shares.iter()) {
            if sharer.user_id == self.paid_by {
                payer_share = share.amount_owed;
                continue;
            }
            participants.push(SplitParticipant {
                user_id: sharer.user_id.clone(),
                display_name: sharer.display_name.clone(),
                email: sharer.email.clone(),
                amount_owed: share.amount_owed,
                percentage: share.percentage,
                settlement_status: SettlementStatus::Unsettled,
                settled_at: None,
                settled_via: None,
            });
        }
        let owed = self.checked_sum(participants.iter().map(|p| p.amount_owed))?;
        if owed > self.total_amount {
            return Err(SplitError::SharesExceedTotal {
                owed,
                total: self.total_amount,
            });
        }

        let shares_total = self.checked_sum(shares.iter().map(|share| share.amount_owed))?;
        let warnings = self.check_totals(shares_total, shares.len())?;
        if !warnings.is_empty() {
            match policy {
                MismatchPolicy::Allow => {}
                MismatchPolicy::Warn => {
                    for finding in &warnings {
                        warn!(paid_by = %self.paid_by, currency = %self.currency, "{finding}");
                    }
                }
                MismatchPolicy::Reject => {
                    let reasons: Vec<String> = warnings.iter().map(ToString::to_string).collect();
                    return Err(SplitError::TotalMismatch(reasons.join("; ")));
                }
            }
        }

        Ok(DraftOutcome {
            split: NewSplit {
                original_expense_id: self.original_expense_id.clone(),
                description: self.description.clone(),
                currency: self.currency.clone(),
                split_method: self.split_method,
                total_amount: self.total_amount,
                paid_by: self.paid_by.clone(),
                payer_share,
                participants,
                group_id: self.group_id.clone(),
            },
            warnings: if policy == MismatchPolicy::Allow {
                Vec::new()
            } else {
                warnings
            },
        })
    }

    fn checked_sum(&self, values: impl IntoIterator<Item = Decimal>) -> SplitResult<Decimal> {
        values
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
            .ok_or(SplitError::AmountOverflow {
                total: self.total_amount,
            })
    }

    fn check_totals(&self, shares: Decimal, count: usize) -> SplitResult<Vec<SplitWarning>> {
        let mut warnings = Vec::new();
        match self.split_method {
            SplitMethod::Equally => {}
            SplitMethod::ByAmount | SplitMethod::ByPercentage => {
                if (shares - self.total_amount).abs() > money_tolerance(count) {
                    warnings.push(SplitWarning::SharesDoNotMatchTotal {
                        method: self.split_method,
                        total: self.total_amount,
                        shares,
                    });
                }
            }
        }
        if self.split_method == SplitMethod::ByPercentage {
            let percentages =
                self.checked_sum(self.sharers.iter().filter_map(|s| s.raw_percentage))?;
            if percentages != Decimal::ONE_HUNDRED {
                warnings.push(SplitWarning::PercentagesDoNotSumToHundred { percentages });
            }
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        "USD".parse().unwrap()
    }

    fn equal_draft() -> SplitDraft {
        SplitDraft::new("alice", usd(), SplitMethod::Equally, dec!(90))
            .with_sharer(Sharer::new("alice", "Alice"))
            .with_sharer(Sharer::new("bob", "Bob").with_email("bob@example.com"))
            .with_sharer(Sharer::new("carol", "Carol"))
            .with_description("groceries")
    }

    #[test]
    fn payer_share_is_pulled_out_of_participants() {
        let outcome = equal_draft().build(MismatchPolicy::Warn).unwrap();
        let split = outcome.split;
        assert_eq!(split.payer_share, dec!(30.00));
        assert_eq!(split.participants.len(), 2);
        assert!(split
            .participants
            .iter()
            .all(|p| p.settlement_status == SettlementStatus::Unsettled));
        let owed: Decimal = split.participants.iter().map(|p| p.amount_owed).sum();
        assert_eq!(owed, split.total_amount - split.payer_share);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn payer_alone_is_not_a_split() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::ByAmount, dec!(10))
            .with_sharer(Sharer::new("alice", "Alice").with_amount(dec!(5)))
            .with_sharer(Sharer::new("alice", "Alice again").with_amount(dec!(5)));
        assert!(matches!(
            draft.build(MismatchPolicy::Warn),
            Err(SplitError::DuplicateParticipant(_))
        ));

        let draft = SplitDraft::new("zoe", usd(), SplitMethod::Equally, dec!(10))
            .with_sharer(Sharer::new("zoe", "Zoe"));
        assert!(matches!(
            draft.build(MismatchPolicy::Warn),
            Err(SplitError::InsufficientParticipants { count: 1 })
        ));
    }

    #[test]
    fn debtor_owed_may_not_exceed_total() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::ByAmount, dec!(10))
            .with_sharer(Sharer::new("bob", "Bob").with_amount(dec!(8)))
            .with_sharer(Sharer::new("carol", "Carol").with_amount(dec!(4)));
        assert_eq!(
            draft.build(MismatchPolicy::Allow).unwrap_err(),
            SplitError::SharesExceedTotal {
                owed: dec!(12.00),
                total: dec!(10)
            }
        );
    }

    #[test]
    fn mismatch_policy_controls_lenient_amounts() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::ByAmount, dec!(50))
            .with_sharer(Sharer::new("bob", "Bob").with_amount(dec!(10)))
            .with_sharer(Sharer::new("carol", "Carol").with_amount(dec!(15)));

        let allowed = draft.build(MismatchPolicy::Allow).unwrap();
        assert!(allowed.warnings.is_empty());

        let warned = draft.build(MismatchPolicy::Warn).unwrap();
        assert_eq!(warned.warnings.len(), 1);
        assert_eq!(warned.split.participants.len(), 2);

        assert!(matches!(
            draft.build(MismatchPolicy::Reject),
            Err(SplitError::TotalMismatch(_))
        ));
    }

    #[test]
    fn percentages_off_hundred_are_reported() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::ByPercentage, dec!(200))
            .with_sharer(Sharer::new("alice", "Alice").with_percentage(dec!(40)))
            .with_sharer(Sharer::new("bob", "Bob").with_percentage(dec!(40)));
        let outcome = draft.build(MismatchPolicy::Warn).unwrap();
        assert_eq!(outcome.split.payer_share, dec!(80.00));
        assert_eq!(outcome.split.participants[0].amount_owed, dec!(80.00));
        assert_eq!(outcome.split.participants[0].percentage, Some(dec!(40)));
        assert!(outcome
            .warnings
            .contains(&SplitWarning::PercentagesDoNotSumToHundred {
                percentages: dec!(80)
            }));
    }

    #[test]
    fn equal_rounding_drift_is_not_a_mismatch() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::Equally, dec!(100))
            .with_sharer(Sharer::new("alice", "Alice"))
            .with_sharer(Sharer::new("bob", "Bob"))
            .with_sharer(Sharer::new("carol", "Carol"));
        let outcome = draft.build(MismatchPolicy::Reject).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.split.payer_share, dec!(33.33));
    }

    #[test]
    fn overflowing_share_sums_are_rejected() {
        let draft = SplitDraft::new("alice", usd(), SplitMethod::ByAmount, Decimal::MAX)
            .with_sharer(Sharer::new("bob", "Bob").with_amount(Decimal::MAX))
            .with_sharer(Sharer::new("carol", "Carol").with_amount(Decimal::MAX));
        assert_eq!(
            draft.build(MismatchPolicy::Allow).unwrap_err(),
            SplitError::AmountOverflow {
                total: Decimal::MAX
            }
        );
    }
}
