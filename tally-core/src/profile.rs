use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GroupId, UserId, Wallet};

/// A user together with their in-app wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub wallet: Wallet,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            wallet: Wallet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Group membership snapshot. Administered externally; Tally only reads it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub member_ids: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(
        id: impl Into<GroupId>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            member_ids: members.into_iter().collect(),
            created_at: Utc::now(),
        }
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.member_ids.contains(user_id)
    }
}
