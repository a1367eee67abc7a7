//! Net balances between users, derived from split participant states.
//!
//! Everything here is a pure function of the splits passed in: no storage
//! access and no clock. Positive amounts mean the counterparty owes the
//! viewer; negative amounts mean the viewer owes the counterparty.

mod sheet;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tally_core::{CurrencyCode, Group, GroupId, SplitExpense, UserId};
use thiserror::Error;

pub use sheet::BalanceSheet;

/// Signed net per currency. A currency that nets to zero has no key.
pub type NetBalance = BTreeMap<CurrencyCode, Decimal>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("{user_id} is not a member of group {group_id}")]
    NotGroupMember { group_id: GroupId, user_id: UserId },
}

pub type BalanceResult<T> = Result<T, BalanceError>;

/// Net balance between `viewer` and `counterparty` across every split given.
pub fn net_balance<'a, I>(splits: I, counterparty: &UserId, viewer: &UserId) -> NetBalance
where
    I: IntoIterator<Item = &'a SplitExpense>,
{
    let mut totals = NetBalance::new();
    if counterparty == viewer {
        return totals;
    }
    for split in splits {
        if let Some(delta) = contribution(split, counterparty, viewer) {
            *totals.entry(split.currency.clone()).or_default() += delta;
        }
    }
    totals.retain(|_, amount| !amount.is_zero());
    totals
}

/// Net balance restricted to one group's splits. Both users must belong to the group.
pub fn group_net_balance<'a, I>(
    splits: I,
    group: &Group,
    counterparty: &UserId,
    viewer: &UserId,
) -> BalanceResult<NetBalance>
where
    I: IntoIterator<Item = &'a SplitExpense>,
{
    for user_id in [viewer, counterparty] {
        if !group.has_member(user_id) {
            return Err(BalanceError::NotGroupMember {
                group_id: group.id.clone(),
                user_id: user_id.clone(),
            });
        }
    }
    Ok(net_balance(
        splits
            .into_iter()
            .filter(|split| split.group_id.as_ref() == Some(&group.id)),
        counterparty,
        viewer,
    ))
}

/// Splits that do not belong to any group.
pub fn personal_only<'a, I>(splits: I) -> impl Iterator<Item = &'a SplitExpense>
where
    I: IntoIterator<Item = &'a SplitExpense>,
{
    splits
        .into_iter()
        .filter(|split| !split.is_group_split())
}

/// Net balance against every user who shares a split with `viewer`.
///
/// Counterparties whose balance is zero in every currency are left out.
pub fn friend_balances<'a, I>(splits: I, viewer: &UserId) -> BTreeMap<UserId, NetBalance>
where
    I: IntoIterator<Item = &'a SplitExpense>,
{
    let splits: Vec<&SplitExpense> = splits.into_iter().collect();
    let mut friends: BTreeMap<UserId, NetBalance> = BTreeMap::new();
    for split in &splits {
        for counterparty in counterparties(split, viewer) {
            if friends.contains_key(counterparty) {
                continue;
            }
            let net = net_balance(splits.iter().copied(), counterparty, viewer);
            friends.insert(counterparty.clone(), net);
        }
    }
    friends.retain(|_, net| !net.is_empty());
    friends
}

/// Friend balances restricted to one group's splits.
///
/// The viewer must belong to the group. Counterparties who are no longer
/// members are left out, even when older group splits still name them.
pub fn group_friend_balances<'a, I>(
    splits: I,
    group: &Group,
    viewer: &UserId,
) -> BalanceResult<BTreeMap<UserId, NetBalance>>
where
    I: IntoIterator<Item = &'a SplitExpense>,
{
    if !group.has_member(viewer) {
        return Err(BalanceError::NotGroupMember {
            group_id: group.id.clone(),
            user_id: viewer.clone(),
        });
    }
    let mut friends = friend_balances(
        splits
            .into_iter()
            .filter(|split| split.group_id.as_ref() == Some(&group.id)),
        viewer,
    );
    friends.retain(|counterparty, _| group.has_member(counterparty));
    Ok(friends)
}

pub fn is_fully_settled(split: &SplitExpense) -> bool {
    split.is_fully_settled()
}

pub fn outstanding_amount(split: &SplitExpense) -> Decimal {
    split.outstanding_amount()
}

fn contribution(split: &SplitExpense, counterparty: &UserId, viewer: &UserId) -> Option<Decimal> {
    if &split.paid_by == viewer {
        split
            .participant(counterparty)
            .filter(|participant| !participant.is_settled())
            .map(|participant| participant.amount_owed)
    } else if &split.paid_by == counterparty {
        split
            .participant(viewer)
            .filter(|participant| !participant.is_settled())
            .map(|participant| -participant.amount_owed)
    } else {
        None
    }
}

fn counterparties<'a>(split: &'a SplitExpense, viewer: &UserId) -> Vec<&'a UserId> {
    if &split.paid_by == viewer {
        split
            .participants
            .iter()
            .map(|participant| &participant.user_id)
            .collect()
    } else if split.participant(viewer).is_some() {
        vec![&split.paid_by]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_test_utils::{eur, usd, user, SplitBuilder};

    fn scenario() -> Vec<SplitExpense> {
        vec![
            SplitBuilder::new("s1", "alice", usd()).owes("bob", dec!(30)).build(),
            SplitBuilder::new("s2", "bob", usd()).owes("alice", dec!(10)).build(),
        ]
    }

    #[test]
    fn nets_opposing_debts() {
        let splits = scenario();
        let net = net_balance(&splits, &user("bob"), &user("alice"));
        assert_eq!(net.get(&usd()), Some(&dec!(20)));
        let mirrored = net_balance(&splits, &user("alice"), &user("bob"));
        assert_eq!(mirrored.get(&usd()), Some(&dec!(-20)));
    }

    #[test]
    fn settled_participants_do_not_contribute() {
        let splits = vec![
            SplitBuilder::new("s1", "alice", usd()).settled("bob", dec!(30)).build(),
            SplitBuilder::new("s2", "bob", usd()).owes("alice", dec!(10)).build(),
        ];
        let net = net_balance(&splits, &user("bob"), &user("alice"));
        assert_eq!(net.get(&usd()), Some(&dec!(-10)));
    }

    #[test]
    fn pending_approval_still_counts() {
        let splits = vec![SplitBuilder::new("s1", "alice", usd())
            .pending("bob", dec!(12.50))
            .build()];
        let net = net_balance(&splits, &user("bob"), &user("alice"));
        assert_eq!(net.get(&usd()), Some(&dec!(12.50)));
    }

    #[test]
    fn zero_nets_are_omitted() {
        let splits = vec![
            SplitBuilder::new("s1", "alice", usd()).owes("bob", dec!(10)).build(),
            SplitBuilder::new("s2", "bob", usd()).owes("alice", dec!(10)).build(),
            SplitBuilder::new("s3", "alice", eur()).owes("bob", dec!(4)).build(),
        ];
        let net = net_balance(&splits, &user("bob"), &user("alice"));
        assert!(!net.contains_key(&usd()));
        assert_eq!(net.get(&eur()), Some(&dec!(4)));
    }

    #[test]
    fn unrelated_splits_are_ignored() {
        let splits = vec![
            SplitBuilder::new("s1", "carol", usd())
                .owes("alice", dec!(5))
                .owes("bob", dec!(5))
                .build(),
        ];
        assert!(net_balance(&splits, &user("bob"), &user("alice")).is_empty());
        assert!(net_balance(&splits, &user("alice"), &user("alice")).is_empty());
    }

    #[test]
    fn aggregation_is_idempotent() {
        let splits = scenario();
        let first = net_balance(&splits, &user("bob"), &user("alice"));
        let second = net_balance(&splits, &user("bob"), &user("alice"));
        assert_eq!(first, second);
    }

    #[test]
    fn group_variant_filters_and_checks_membership() {
        let splits = vec![
            SplitBuilder::new("s1", "alice", usd())
                .owes("bob", dec!(30))
                .in_group("trip")
                .build(),
            SplitBuilder::new("s2", "alice", usd()).owes("bob", dec!(7)).build(),
        ];
        let trip = Group::new("trip", "Trip", [user("alice"), user("bob")]);
        let net = group_net_balance(&splits, &trip, &user("bob"), &user("alice")).unwrap();
        assert_eq!(net.get(&usd()), Some(&dec!(30)));

        let personal = net_balance(personal_only(&splits), &user("bob"), &user("alice"));
        assert_eq!(personal.get(&usd()), Some(&dec!(7)));

        let err = group_net_balance(&splits, &trip, &user("carol"), &user("alice")).unwrap_err();
        assert_eq!(
            err,
            BalanceError::NotGroupMember {
                group_id: GroupId::from("trip"),
                user_id: user("carol"),
            }
        );
    }

    #[test]
    fn friend_balances_cover_every_counterparty() {
        let splits = vec![
            SplitBuilder::new("s1", "alice", usd())
                .owes("bob", dec!(30))
                .owes("carol", dec!(15))
                .build(),
            SplitBuilder::new("s2", "dave", usd()).owes("alice", dec!(8)).build(),
            SplitBuilder::new("s3", "alice", usd()).settled("erin", dec!(3)).build(),
        ];
        let friends = friend_balances(&splits, &user("alice"));
        let ids: Vec<&str> = friends.keys().map(UserId::as_str).collect();
        assert_eq!(ids, vec!["bob", "carol", "dave"]);
        assert_eq!(friends[&user("dave")].get(&usd()), Some(&dec!(-8)));
    }

    #[test]
    fn group_friends_skip_former_members() {
        let splits = vec![
            SplitBuilder::new("s1", "alice", usd())
                .owes("bob", dec!(30))
                .owes("carol", dec!(12))
                .in_group("trip")
                .build(),
            SplitBuilder::new("s2", "alice", usd()).owes("dave", dec!(9)).build(),
        ];
        // carol left the trip after s1 was recorded
        let trip = Group::new("trip", "Trip", [user("alice"), user("bob")]);
        let friends = group_friend_balances(&splits, &trip, &user("alice")).unwrap();
        let ids: Vec<&str> = friends.keys().map(UserId::as_str).collect();
        assert_eq!(ids, vec!["bob"]);
        assert_eq!(friends[&user("bob")].get(&usd()), Some(&dec!(30)));

        assert!(matches!(
            group_friend_balances(&splits, &trip, &user("carol")),
            Err(BalanceError::NotGroupMember { .. })
        ));
    }

    #[test]
    fn derived_split_predicates() {
        let split = SplitBuilder::new("s1", "alice", usd())
            .owes("bob", dec!(30))
            .settled("carol", dec!(15))
            .build();
        assert!(!is_fully_settled(&split));
        assert_eq!(outstanding_amount(&split), dec!(30));
    }
}
