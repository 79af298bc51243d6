use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Cents, LedgerFilter, Transaction, TransactionMetadata, TransactionStatus, TransactionType,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying ledger transactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Insert a new transaction. Assigns the next sequence number and stamps
    /// the created/updated timestamps before writing.
    pub async fn save_transaction(&self, transaction: &mut Transaction) -> Result<()> {
        let sequence = self.next_sequence().await?;
        transaction.sequence = sequence;

        let now = Utc::now();
        transaction.created_at = now;
        transaction.updated_at = now;

        let metadata_json = serde_json::to_string(&transaction.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.transaction_id)
        .bind(transaction.sequence)
        .bind(&transaction.user_id)
        .bind(&transaction.quest_id)
        .bind(transaction.amount)
        .bind(transaction.kind.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.description)
        .bind(&metadata_json)
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.updated_at.to_rfc3339())
        .bind(transaction.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Get a transaction by id, scoped to its owner.
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at
            FROM transactions
            WHERE transaction_id = ? AND user_id = ?
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Flip a releasable payment to COMPLETED in a single conditional update
    /// and return the updated row. Matching is on {id, owner, kind = PAYMENT,
    /// status in (PENDING, ON_HOLD)}; `None` means no row qualified, so two
    /// concurrent release calls cannot both succeed.
    pub async fn complete_releasable_payment(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<Option<Transaction>> {
        let now = Utc::now().to_rfc3339();

        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'COMPLETED', completed_at = ?, updated_at = ?
            WHERE transaction_id = ? AND user_id = ?
              AND kind = 'PAYMENT'
              AND status IN ('PENDING', 'ON_HOLD')
            RETURNING transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to complete payment")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a payment eligible for refund: owned by the user, kind PAYMENT,
    /// status COMPLETED.
    pub async fn get_completed_payment(
        &self,
        transaction_id: &str,
        user_id: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at
            FROM transactions
            WHERE transaction_id = ? AND user_id = ?
              AND kind = 'PAYMENT'
              AND status = 'COMPLETED'
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch refundable payment")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// List a user's transactions matching the filter, most recent first,
    /// with the filter's limit/skip applied.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        filter: &LedgerFilter,
    ) -> Result<Vec<Transaction>> {
        let mut query = String::from(
            "SELECT transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at FROM transactions WHERE user_id = ?"
        );

        // Collect string bindings first so they live long enough
        let start_date_str = filter.start_date.map(|dt| dt.to_rfc3339());
        let end_date_str = filter.end_date.map(|dt| dt.to_rfc3339());

        if filter.kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.start_date.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        if filter.end_date.is_some() {
            query.push_str(" AND created_at <= ?");
        }

        query.push_str(" ORDER BY created_at DESC, sequence DESC");
        query.push_str(&format!(" LIMIT {} OFFSET {}", filter.limit, filter.skip));

        let mut sql_query = sqlx::query(&query).bind(user_id);

        if let Some(kind) = filter.kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(ref sd) = start_date_str {
            sql_query = sql_query.bind(sd);
        }
        if let Some(ref ed) = end_date_str {
            sql_query = sql_query.bind(ed);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count a user's transactions matching the filter, ignoring limit/skip.
    pub async fn count_transactions(&self, user_id: &str, filter: &LedgerFilter) -> Result<i64> {
        let mut query = String::from("SELECT COUNT(*) as count FROM transactions WHERE user_id = ?");

        let start_date_str = filter.start_date.map(|dt| dt.to_rfc3339());
        let end_date_str = filter.end_date.map(|dt| dt.to_rfc3339());

        if filter.kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.start_date.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        if filter.end_date.is_some() {
            query.push_str(" AND created_at <= ?");
        }

        let mut sql_query = sqlx::query(&query).bind(user_id);

        if let Some(kind) = filter.kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(ref sd) = start_date_str {
            sql_query = sql_query.bind(sd);
        }
        if let Some(ref ed) = end_date_str {
            sql_query = sql_query.bind(ed);
        }

        let row = sql_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;

        Ok(row.get("count"))
    }

    /// Sum amounts of a user's COMPLETED transactions grouped by kind.
    /// Kinds with no completed transactions are absent from the result.
    pub async fn sum_completed_by_kind(
        &self,
        user_id: &str,
    ) -> Result<Vec<(TransactionType, Cents)>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE user_id = ? AND status = 'COMPLETED'
            GROUP BY kind
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate completed amounts")?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                let kind = TransactionType::from_str(&kind_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?;
                Ok((kind, row.get("total")))
            })
            .collect()
    }

    /// Sum amounts of all of a user's transactions grouped by (kind, status).
    pub async fn sum_by_kind_and_status(
        &self,
        user_id: &str,
    ) -> Result<Vec<(TransactionType, TransactionStatus, Cents)>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, status, COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE user_id = ?
            GROUP BY kind, status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate transaction summary")?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                let status_str: String = row.get("status");
                let kind = TransactionType::from_str(&kind_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?;
                let status = TransactionStatus::from_str(&status_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?;
                Ok((kind, status, row.get("total")))
            })
            .collect()
    }

    /// List every transaction of a user in insert order (for export).
    pub async fn list_all_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT transaction_id, sequence, user_id, quest_id, amount_cents, kind, status, description, metadata, created_at, updated_at, completed_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY sequence
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for export")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");
        let metadata_json: String = row.get("metadata");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");
        let completed_at_str: Option<String> = row.get("completed_at");

        Ok(Transaction {
            transaction_id: row.get("transaction_id"),
            sequence: row.get("sequence"),
            user_id: row.get("user_id"),
            quest_id: row.get("quest_id"),
            amount: row.get("amount_cents"),
            kind: TransactionType::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            description: row.get("description"),
            metadata: serde_json::from_str::<TransactionMetadata>(&metadata_json)
                .unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .context("Invalid updated_at timestamp")?
                .with_timezone(&Utc),
            completed_at: completed_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid completed_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}
