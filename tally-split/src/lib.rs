//! Share computation for split expenses: turns a total, a method and a list of
//! sharers into validated per-participant amounts.

mod calculator;
mod draft;
mod error;
mod policy;

pub use calculator::{compute_shares, ComputedShare, ShareInput};
pub use draft::{DraftOutcome, Sharer, SplitDraft};
pub use error::{SplitError, SplitResult};
pub use policy::{MismatchPolicy, SplitWarning};
