use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, TransactionStatus, TransactionType};

/// Query configuration for a user's ledger page. Each field is independently
/// optional; date bounds are inclusive on both ends.
#[derive(Debug, Clone)]
pub struct LedgerFilter {
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub skip: i64,
}

impl Default for LedgerFilter {
    fn default() -> Self {
        Self {
            kind: None,
            status: None,
            start_date: None,
            end_date: None,
            limit: 50,
            skip: 0,
        }
    }
}

/// Reduce per-kind totals over COMPLETED transactions into a net balance.
/// Completed payments are debits, completed refunds are credits; release and
/// hold records never move the balance.
pub fn balance_from_totals(totals: &[(TransactionType, Cents)]) -> Cents {
    totals.iter().fold(0, |balance, (kind, total)| match kind {
        TransactionType::Payment => balance - total,
        TransactionType::Refund => balance + total,
        TransactionType::Release | TransactionType::Hold => balance,
    })
}

/// Whole-account statistics across every status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Sum over all PAYMENT transactions, any status
    pub total_payments: Cents,
    /// Sum over all REFUND transactions, any status
    pub total_refunds: Cents,
    /// Sum over PAYMENT transactions still PENDING
    pub pending_amount: Cents,
    /// Sum over PAYMENT transactions that reached COMPLETED
    pub completed_amount: Cents,
}

/// Reduce (kind, status) grouped totals into a summary.
pub fn summarize(groups: &[(TransactionType, TransactionStatus, Cents)]) -> TransactionSummary {
    let mut summary = TransactionSummary::default();

    for (kind, status, total) in groups {
        match kind {
            TransactionType::Payment => {
                summary.total_payments += total;
                match status {
                    TransactionStatus::Pending => summary.pending_amount += total,
                    TransactionStatus::Completed => summary.completed_amount += total,
                    _ => {}
                }
            }
            TransactionType::Refund => summary.total_refunds += total,
            TransactionType::Release | TransactionType::Hold => {}
        }
    }

    summary
}

/// Resolve the effective refund amount: the requested value, or the full
/// original amount when none was given. The bound is the original payment's
/// amount on every call; refunds already issued against it are not counted.
pub fn resolve_refund_amount(
    original_amount: Cents,
    requested: Option<Cents>,
) -> Result<Cents, RefundAmountError> {
    let amount = requested.unwrap_or(original_amount);

    if amount <= 0 {
        return Err(RefundAmountError::NotPositive { requested: amount });
    }
    if amount > original_amount {
        return Err(RefundAmountError::ExceedsOriginal {
            original_amount,
            requested: amount,
        });
    }

    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundAmountError {
    NotPositive {
        requested: Cents,
    },
    ExceedsOriginal {
        original_amount: Cents,
        requested: Cents,
    },
}

impl std::fmt::Display for RefundAmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundAmountError::NotPositive { requested } => {
                write!(f, "Refund amount must be positive (got {} cents)", requested)
            }
            RefundAmountError::ExceedsOriginal {
                original_amount,
                requested,
            } => {
                write!(
                    f,
                    "Refund of {} cents would exceed the original payment of {} cents",
                    requested, original_amount
                )
            }
        }
    }
}

impl std::error::Error for RefundAmountError {}
