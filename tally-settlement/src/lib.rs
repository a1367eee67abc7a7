//! Settlement lifecycle for split participants.
//!
//! [`transition`] is the pure state machine; [`SettlementService`] applies it
//! against a [`tally_store::SplitRepository`] together with the wallet
//! movements each transition authorizes.

mod error;
mod machine;
mod service;

pub use error::{SettlementError, SettlementResult};
pub use machine::{transition, ActorRole, IllegalTransition, SettlementAction};
pub use service::{CreatedSplit, SettlementService, TransitionOutcome};
