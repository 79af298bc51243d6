use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// A quest payment held until the work is accepted
    Payment,
    /// A reversal (full or partial) of a completed payment
    Refund,
    /// Audit record written when a held payment is completed
    Release,
    /// Funds parked outside the payment flow
    Hold,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Refund => "REFUND",
            TransactionType::Release => "RELEASE",
            TransactionType::Hold => "HOLD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PAYMENT" => Some(TransactionType::Payment),
            "REFUND" => Some(TransactionType::Refund),
            "RELEASE" => Some(TransactionType::Release),
            "HOLD" => Some(TransactionType::Hold),
            _ => None,
        }
    }

    /// Prefix used when generating transaction ids of this kind,
    /// so a raw id is traceable to its kind by eye.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TransactionType::Payment => "TXN",
            TransactionType::Refund => "RFD",
            TransactionType::Release => "REL",
            TransactionType::Hold => "HLD",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    OnHold,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::OnHold => "ON_HOLD",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransactionStatus::Pending),
            "ON_HOLD" => Some(TransactionStatus::OnHold),
            "COMPLETED" => Some(TransactionStatus::Completed),
            "FAILED" => Some(TransactionStatus::Failed),
            "CANCELLED" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses from which a payment can still be released.
    pub fn is_releasable(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::OnHold)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Write-once correlation fields carried alongside a transaction.
/// Release and refund records copy the original's bag and add their own keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,
}

/// A single monetary event in a user's ledger. Records are append-mostly:
/// `status` (and its `completed_at`/`updated_at` companions) is the only
/// field that ever changes after insert, and only for the release operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Globally unique, kind-prefixed id (`TXN-…`, `REL-…`, `RFD-…`)
    pub transaction_id: String,
    /// Monotonic insert sequence, assigned by the repository
    pub sequence: i64,
    /// Owning user; every query and mutation is scoped to it
    pub user_id: String,
    /// Correlation to an external quest entity, opaque here
    pub quest_id: Option<String>,
    /// Amount in cents (never negative)
    pub amount: Cents,
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub description: String,
    pub metadata: TransactionMetadata,
    /// Stamped by the repository on insert
    pub created_at: DateTime<Utc>,
    /// Stamped by the repository on insert and on status change
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, when the transaction reaches COMPLETED
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a new payment in PENDING state. Sequence and the created/updated
    /// timestamps are finalized by the repository on insert.
    pub fn new_payment(
        user_id: impl Into<String>,
        amount: Cents,
        description: impl Into<String>,
    ) -> Self {
        assert!(amount > 0, "Payment amount must be positive");
        let now = Utc::now();
        Self {
            transaction_id: generate_id(TransactionType::Payment),
            sequence: 0, // Will be set by repository
            user_id: user_id.into(),
            quest_id: None,
            amount,
            kind: TransactionType::Payment,
            status: TransactionStatus::Pending,
            description: description.into(),
            metadata: TransactionMetadata::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_quest(mut self, quest_id: impl Into<String>) -> Self {
        self.quest_id = Some(quest_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: TransactionMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Derive the companion RELEASE record for this payment. The record is
    /// born COMPLETED with the same amount and quest correlation, and its
    /// metadata points back at this payment.
    pub fn create_release_record(&self) -> Self {
        let now = Utc::now();
        Self {
            transaction_id: generate_id(TransactionType::Release),
            sequence: 0,
            user_id: self.user_id.clone(),
            quest_id: self.quest_id.clone(),
            amount: self.amount,
            kind: TransactionType::Release,
            status: TransactionStatus::Completed,
            description: format!("Payment released for: {}", self.description),
            metadata: TransactionMetadata {
                original_transaction_id: Some(self.transaction_id.clone()),
                ..self.metadata.clone()
            },
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    /// Derive a REFUND record against this payment for the given amount.
    /// The record is born COMPLETED and carries the refund reason plus a
    /// back-reference to this payment in its metadata.
    pub fn create_refund_record(&self, amount: Cents, reason: impl Into<String>) -> Self {
        assert!(
            amount > 0 && amount <= self.amount,
            "Refund amount must be between 0 and the original amount"
        );
        let now = Utc::now();
        Self {
            transaction_id: generate_id(TransactionType::Refund),
            sequence: 0,
            user_id: self.user_id.clone(),
            quest_id: self.quest_id.clone(),
            amount,
            kind: TransactionType::Refund,
            status: TransactionStatus::Completed,
            description: format!("Refund for: {}", self.description),
            metadata: TransactionMetadata {
                refund_reason: Some(reason.into()),
                original_transaction_id: Some(self.transaction_id.clone()),
                ..self.metadata.clone()
            },
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    /// Returns true if this record references another transaction
    /// (release and refund records always do).
    pub fn references_original(&self) -> bool {
        self.metadata.original_transaction_id.is_some()
    }
}

/// Generate a fresh kind-prefixed transaction id, e.g. `TXN-5f0c…`.
pub fn generate_id(kind: TransactionType) -> String {
    format!("{}-{}", kind.id_prefix(), Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_roundtrip() {
        for kind in [
            TransactionType::Payment,
            TransactionType::Refund,
            TransactionType::Release,
            TransactionType::Hold,
        ] {
            let s = kind.as_str();
            assert_eq!(TransactionType::from_str(s), Some(kind));
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::OnHold,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            let s = status.as_str();
            assert_eq!(TransactionStatus::from_str(s), Some(status));
        }
    }

    #[test]
    fn test_generated_ids_are_kind_prefixed() {
        assert!(generate_id(TransactionType::Payment).starts_with("TXN-"));
        assert!(generate_id(TransactionType::Release).starts_with("REL-"));
        assert!(generate_id(TransactionType::Refund).starts_with("RFD-"));
        assert!(generate_id(TransactionType::Hold).starts_with("HLD-"));
    }

    #[test]
    fn test_new_payment_is_pending() {
        let tx = Transaction::new_payment("user-1", 10000, "Dragon slaying");

        assert_eq!(tx.kind, TransactionType::Payment);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount, 10000);
        assert!(tx.completed_at.is_none());
        assert!(!tx.references_original());
    }

    #[test]
    #[should_panic(expected = "Payment amount must be positive")]
    fn test_new_payment_rejects_zero_amount() {
        Transaction::new_payment("user-1", 0, "Free quest");
    }

    #[test]
    fn test_release_record_points_back_at_original() {
        let original = Transaction::new_payment("user-1", 5000, "Escort caravan")
            .with_quest("quest-42")
            .with_metadata(TransactionMetadata {
                quest_name: Some("Escort the caravan".into()),
                guild_name: Some("Silver Hand".into()),
                ..Default::default()
            });

        let release = original.create_release_record();

        assert_eq!(release.kind, TransactionType::Release);
        assert_eq!(release.status, TransactionStatus::Completed);
        assert_eq!(release.amount, original.amount);
        assert_eq!(release.quest_id, original.quest_id);
        assert_eq!(
            release.metadata.original_transaction_id,
            Some(original.transaction_id.clone())
        );
        // The original's correlation fields are carried forward
        assert_eq!(release.metadata.guild_name, Some("Silver Hand".into()));
        assert!(release.completed_at.is_some());
        assert!(release.description.contains("Escort caravan"));
    }

    #[test]
    fn test_refund_record_carries_reason() {
        let original = Transaction::new_payment("user-1", 5000, "Escort caravan");
        let refund = original.create_refund_record(2000, "caravan lost");

        assert_eq!(refund.kind, TransactionType::Refund);
        assert_eq!(refund.status, TransactionStatus::Completed);
        assert_eq!(refund.amount, 2000);
        assert_eq!(refund.metadata.refund_reason, Some("caravan lost".into()));
        assert_eq!(
            refund.metadata.original_transaction_id,
            Some(original.transaction_id.clone())
        );
    }

    #[test]
    #[should_panic(expected = "Refund amount must be between 0 and the original amount")]
    fn test_refund_record_rejects_excess_amount() {
        let original = Transaction::new_payment("user-1", 5000, "Escort caravan");
        original.create_refund_record(5001, "too much");
    }

    #[test]
    fn test_releasable_statuses() {
        assert!(TransactionStatus::Pending.is_releasable());
        assert!(TransactionStatus::OnHold.is_releasable());
        assert!(!TransactionStatus::Completed.is_releasable());
        assert!(!TransactionStatus::Failed.is_releasable());
        assert!(!TransactionStatus::Cancelled.is_releasable());
    }
}
