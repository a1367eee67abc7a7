use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::{SplitExpense, UserId};

use crate::{friend_balances, NetBalance};

/// A viewer's position against all of their friends at once.
///
/// `owed_to_viewer` and `viewer_owes` hold non-negative totals per currency;
/// a friend contributes to one side or the other, never both, per currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceSheet {
    pub viewer: UserId,
    pub friends: BTreeMap<UserId, NetBalance>,
    pub owed_to_viewer: NetBalance,
    pub viewer_owes: NetBalance,
}

impl BalanceSheet {
    pub fn build<'a, I>(splits: I, viewer: &UserId) -> Self
    where
        I: IntoIterator<Item = &'a SplitExpense>,
    {
        let friends = friend_balances(splits, viewer);
        let mut owed_to_viewer = NetBalance::new();
        let mut viewer_owes = NetBalance::new();
        for net in friends.values() {
            for (currency, amount) in net {
                let side = if *amount > Decimal::ZERO {
                    &mut owed_to_viewer
                } else {
                    &mut viewer_owes
                };
                *side.entry(currency.clone()).or_default() += amount.abs();
            }
        }
        Self {
            viewer: viewer.clone(),
            friends,
            owed_to_viewer,
            viewer_owes,
        }
    }

    /// Owed-to-viewer minus viewer-owes, per currency, zeros omitted.
    pub fn net(&self) -> NetBalance {
        let mut net = self.owed_to_viewer.clone();
        for (currency, amount) in &self.viewer_owes {
            *net.entry(currency.clone()).or_default() -= *amount;
        }
        net.retain(|_, amount| !amount.is_zero());
        net
    }
}
