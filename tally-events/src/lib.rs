use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{CurrencyCode, SettlementStatus, SplitExpense, SplitId, UserId};
use tokio::sync::broadcast;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitCreatedEvent {
    pub split: SplitExpense,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantStatusEvent {
    pub split_id: SplitId,
    pub participant_id: UserId,
    pub paid_by: UserId,
    pub from: SettlementStatus,
    pub to: SettlementStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletEvent {
    pub user_id: UserId,
    pub currency: CurrencyCode,
    pub amount: Decimal,
    pub balance: Decimal,
}

/// Committed state changes. Published only after the store transaction commits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Event {
    SplitCreated(SplitCreatedEvent),
    ParticipantStatusChanged(ParticipantStatusEvent),
    WalletCredited(WalletEvent),
    WalletDebited(WalletEvent),
}

impl Event {
    /// Users whose balances may have changed because of this event.
    pub fn affected_users(&self) -> Vec<UserId> {
        match self {
            Event::SplitCreated(event) => event.split.involved_user_ids.iter().cloned().collect(),
            Event::ParticipantStatusChanged(event) => {
                vec![event.participant_id.clone(), event.paid_by.clone()]
            }
            Event::WalletCredited(event) | Event::WalletDebited(event) => {
                vec![event.user_id.clone()]
            }
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

pub struct EventStream {
    receiver: broadcast::Receiver<Event>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}
