use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::PaymentService;
use crate::domain::Transaction;

/// Snapshot of one user's ledger for JSON export/backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting a user's ledger to various formats
pub struct Exporter<'a> {
    service: &'a PaymentService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a PaymentService) -> Self {
        Self { service }
    }

    /// Export a user's transactions to CSV format
    pub async fn export_ledger_csv<W: Write>(&self, user_id: &str, writer: W) -> Result<usize> {
        let transactions = self.service.list_user_transactions(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record([
            "transaction_id",
            "sequence",
            "created_at",
            "kind",
            "status",
            "amount_cents",
            "description",
            "quest_id",
            "original_transaction_id",
            "refund_reason",
            "completed_at",
        ])?;

        let mut count = 0;
        for tx in &transactions {
            csv_writer.write_record([
                tx.transaction_id.clone(),
                tx.sequence.to_string(),
                tx.created_at.to_rfc3339(),
                tx.kind.as_str().to_string(),
                tx.status.as_str().to_string(),
                tx.amount.to_string(),
                tx.description.clone(),
                tx.quest_id.clone().unwrap_or_default(),
                tx.metadata
                    .original_transaction_id
                    .clone()
                    .unwrap_or_default(),
                tx.metadata.refund_reason.clone().unwrap_or_default(),
                tx.completed_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a user's full ledger as a JSON snapshot
    pub async fn export_ledger_json<W: Write>(
        &self,
        user_id: &str,
        mut writer: W,
    ) -> Result<LedgerSnapshot> {
        let transactions = self.service.list_user_transactions(user_id).await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id: user_id.to_string(),
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
