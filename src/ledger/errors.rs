//! Error types returned by ledger transitions.
use std::fmt;

use super::types::ChildId;

/// Reasons a ledger transition can be rejected. State is never changed on error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InvalidInput {
        field: &'static str,
        reason: String,
    },
    InsufficientBalance {
        child_id: ChildId,
        balance: u64,
        cost: u32,
    },
    /// The new state was computed but could not be written, so it was dropped.
    NotSaved { reason: String },
}

impl LedgerError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn insufficient_balance(child_id: ChildId, balance: u64, cost: u32) -> Self {
        Self::InsufficientBalance {
            child_id,
            balance,
            cost,
        }
    }

    pub fn not_saved(reason: impl Into<String>) -> Self {
        Self::NotSaved {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field, reason } => {
                write!(f, "Invalid input ({}): {}", field, reason)
            }
            Self::InsufficientBalance {
                child_id,
                balance,
                cost,
            } => write!(
                f,
                "Insufficient balance for {}: has {} points, needs {}",
                child_id, balance, cost
            ),
            Self::NotSaved { reason } => {
                write!(f, "Change not recorded; the ledger could not be saved: {}", reason)
            }
        }
    }
}

impl std::error::Error for LedgerError {}
