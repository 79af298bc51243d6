use tracing::{debug, info};

use crate::domain::{
    balance_from_totals, resolve_refund_amount, summarize, Cents, LedgerFilter, RefundAmountError,
    Transaction, TransactionMetadata, TransactionSummary,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the ledger operations for a given user.
/// This is the primary interface for any client (CLI, API, TUI, etc.);
/// callers are expected to pass an already-authenticated user id.
pub struct PaymentService {
    repo: Repository,
}

/// One page of a user's ledger plus whole-account figures.
pub struct LedgerPage {
    /// Matching transactions, most recent first
    pub transactions: Vec<Transaction>,
    /// Total matching count, ignoring pagination
    pub total: i64,
    /// Net balance over ALL of the user's completed transactions,
    /// independent of the filter applied to the page
    pub balance: Cents,
}

impl PaymentService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Record a new payment in PENDING state.
    pub async fn create_payment(
        &self,
        user_id: &str,
        amount: Cents,
        description: &str,
        quest_id: Option<String>,
        metadata: Option<TransactionMetadata>,
    ) -> Result<Transaction, AppError> {
        if amount <= 0 {
            return Err(AppError::validation("Amount must be greater than 0"));
        }
        if description.trim().is_empty() {
            return Err(AppError::validation("Description is required"));
        }

        let mut transaction = Transaction::new_payment(user_id, amount, description);
        if let Some(quest_id) = quest_id {
            transaction = transaction.with_quest(quest_id);
        }
        if let Some(metadata) = metadata {
            transaction = transaction.with_metadata(metadata);
        }

        self.repo.save_transaction(&mut transaction).await?;

        info!(
            transaction_id = %transaction.transaction_id,
            user_id,
            amount,
            "payment created"
        );
        Ok(transaction)
    }

    /// Release a pending or on-hold payment: the original flips to COMPLETED
    /// and a companion RELEASE record is written. Returns the updated
    /// original, not the release record.
    ///
    /// The status flip and the release insert are a best-effort pair, not a
    /// transaction: if the insert fails the completed original stands.
    pub async fn release_payment(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<Transaction, AppError> {
        let original = self
            .repo
            .complete_releasable_payment(transaction_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Transaction not found or cannot be released")
            })?;

        let mut release_record = original.create_release_record();
        self.repo.save_transaction(&mut release_record).await?;

        info!(
            transaction_id = %original.transaction_id,
            release_id = %release_record.transaction_id,
            user_id,
            "payment released"
        );
        Ok(original)
    }

    /// Refund a completed payment, fully or partially. Creates a fresh
    /// REFUND record and returns it; the original is never mutated.
    ///
    /// The amount bound is the original payment's amount on every call;
    /// refunds already issued against it are not counted.
    pub async fn process_refund(
        &self,
        transaction_id: &str,
        user_id: &str,
        amount: Option<Cents>,
        reason: &str,
    ) -> Result<Transaction, AppError> {
        let original = self
            .repo
            .get_completed_payment(transaction_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found("Original transaction not found or cannot be refunded")
            })?;

        if reason.trim().is_empty() {
            return Err(AppError::validation("Refund reason is required"));
        }

        let refund_amount =
            resolve_refund_amount(original.amount, amount).map_err(|err| match err {
                RefundAmountError::NotPositive { .. } => {
                    AppError::validation("Refund amount must be greater than 0")
                }
                RefundAmountError::ExceedsOriginal { .. } => {
                    AppError::validation("Refund amount cannot exceed original payment amount")
                }
            })?;

        let mut refund = original.create_refund_record(refund_amount, reason);
        self.repo.save_transaction(&mut refund).await?;

        info!(
            transaction_id = %refund.transaction_id,
            original_id = %original.transaction_id,
            user_id,
            amount = refund_amount,
            "refund processed"
        );
        Ok(refund)
    }

    /// Fetch one page of a user's ledger. The balance on the returned page
    /// covers the whole account, not just the visible rows.
    pub async fn get_user_ledger(
        &self,
        user_id: &str,
        filter: LedgerFilter,
    ) -> Result<LedgerPage, AppError> {
        let transactions = self.repo.list_transactions(user_id, &filter).await?;
        let total = self.repo.count_transactions(user_id, &filter).await?;

        let totals = self.repo.sum_completed_by_kind(user_id).await?;
        let balance = balance_from_totals(&totals);

        debug!(user_id, total, balance, "ledger page fetched");
        Ok(LedgerPage {
            transactions,
            total,
            balance,
        })
    }

    /// Look up a single transaction scoped to the user. Absence is a value,
    /// not an error; the request layer turns it into its own 404.
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<Option<Transaction>, AppError> {
        Ok(self.repo.get_transaction(transaction_id, user_id).await?)
    }

    /// Whole-account statistics across every status.
    pub async fn get_transaction_summary(
        &self,
        user_id: &str,
    ) -> Result<TransactionSummary, AppError> {
        let groups = self.repo.sum_by_kind_and_status(user_id).await?;
        Ok(summarize(&groups))
    }

    /// Every transaction of a user in insert order (used by export).
    pub async fn list_user_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_all_for_user(user_id).await?)
    }
}
