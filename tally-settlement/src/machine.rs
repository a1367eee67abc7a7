use std::fmt;

use serde::{Deserialize, Serialize};
use tally_core::SettlementStatus;

/// The four ways a participant's settlement status can be moved.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementAction {
    SettleWithWallet,
    RequestApproval,
    Approve,
    Reject,
}

/// Which side of the debt is allowed to perform an action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActorRole {
    Debtor,
    Payer,
}

impl SettlementAction {
    pub const ALL: [SettlementAction; 4] = [
        SettlementAction::SettleWithWallet,
        SettlementAction::RequestApproval,
        SettlementAction::Approve,
        SettlementAction::Reject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettlementAction::SettleWithWallet => "settle_with_wallet",
            SettlementAction::RequestApproval => "request_approval",
            SettlementAction::Approve => "approve",
            SettlementAction::Reject => "reject",
        }
    }

    pub fn required_role(self) -> ActorRole {
        match self {
            SettlementAction::SettleWithWallet | SettlementAction::RequestApproval => {
                ActorRole::Debtor
            }
            SettlementAction::Approve | SettlementAction::Reject => ActorRole::Payer,
        }
    }
}

impl fmt::Display for SettlementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action attempted from a status that does not allow it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IllegalTransition {
    pub from: SettlementStatus,
    pub action: SettlementAction,
}

/// Status reached by applying `action` to `from`.
///
/// `settled` is terminal: every action from it is illegal.
pub fn transition(
    from: SettlementStatus,
    action: SettlementAction,
) -> Result<SettlementStatus, IllegalTransition> {
    use SettlementAction::*;
    use SettlementStatus::*;

    match (from, action) {
        (Unsettled, SettleWithWallet) => Ok(Settled),
        (Unsettled, RequestApproval) => Ok(PendingApproval),
        (PendingApproval, Approve) => Ok(Settled),
        (PendingApproval, Reject) => Ok(Unsettled),
        (Unsettled, Approve | Reject)
        | (PendingApproval, SettleWithWallet | RequestApproval)
        | (Settled, _) => Err(IllegalTransition { from, action }),
    }
}
