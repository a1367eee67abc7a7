use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::{ParseEnumError, SplitMethod};

/// What to do when explicit amounts or percentages do not add up to the total.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Accept silently.
    Allow,
    /// Accept, log a warning and report it on the draft outcome.
    #[default]
    Warn,
    /// Refuse to build the split.
    Reject,
}

impl MismatchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MismatchPolicy::Allow => "allow",
            MismatchPolicy::Warn => "warn",
            MismatchPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MismatchPolicy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(MismatchPolicy::Allow),
            "warn" => Ok(MismatchPolicy::Warn),
            "reject" => Ok(MismatchPolicy::Reject),
            other => Err(ParseEnumError {
                kind: "mismatch policy",
                value: other.to_string(),
            }),
        }
    }
}

/// Non-fatal findings attached to a successfully built split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitWarning {
    SharesDoNotMatchTotal {
        method: SplitMethod,
        total: Decimal,
        shares: Decimal,
    },
    PercentagesDoNotSumToHundred {
        percentages: Decimal,
    },
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitWarning::SharesDoNotMatchTotal {
                method,
                total,
                shares,
            } => write!(f, "{method} shares sum to {shares} but the total is {total}"),
            SplitWarning::PercentagesDoNotSumToHundred { percentages } => {
                write!(f, "percentages sum to {percentages} instead of 100")
            }
        }
    }
}
