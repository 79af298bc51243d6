use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::application::PaymentService;
use crate::domain::{
    format_cents, parse_amount, LedgerFilter, Transaction, TransactionStatus, TransactionType,
};
use crate::io::Exporter;

/// Tavern Ledger - quest payment tracking
#[derive(Parser)]
#[command(name = "tavern-ledger")]
#[command(about = "A transaction ledger for quest payments, releases and refunds")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "tavern-ledger.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record a new quest payment (starts out pending)
    Pay {
        /// Amount to pay (e.g., "50.00" or "50")
        amount: String,

        /// Description of what the payment is for
        #[arg(short = 'm', long)]
        description: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Quest id this payment is tied to
        #[arg(short, long)]
        quest: Option<String>,
    },

    /// Release a pending payment (marks it completed and records the release)
    Release {
        /// Transaction id of the payment to release
        id: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,
    },

    /// Refund a completed payment, fully or partially
    Refund {
        /// Transaction id of the original payment
        id: String,

        /// Reason for the refund
        #[arg(short, long)]
        reason: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Amount to refund (omit for a full refund)
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Show a page of the ledger with the account balance
    Ledger {
        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Filter by kind: payment, refund, release, hold
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Filter by status: pending, on_hold, completed, failed, cancelled
        #[arg(short, long)]
        status: Option<String>,

        /// Filter from date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Number of transactions to skip
        #[arg(long, default_value = "0")]
        skip: i64,
    },

    /// Show a single transaction in detail
    #[command(name = "show")]
    ShowTransaction {
        /// Transaction id
        id: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,
    },

    /// Show whole-account payment statistics
    Summary {
        /// Acting user id
        #[arg(short, long)]
        user: String,
    },

    /// Export a user's ledger to CSV or JSON
    Export {
        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Acting user id
        #[arg(short, long)]
        user: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                PaymentService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Pay {
                amount,
                description,
                user,
                quest,
            } => {
                let service = PaymentService::connect(&self.database).await?;
                let amount_cents =
                    parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let transaction = service
                    .create_payment(&user, amount_cents, &description, quest, None)
                    .await?;

                println!(
                    "Created payment {} for {} ({})",
                    transaction.transaction_id,
                    format_cents(transaction.amount),
                    transaction.status
                );
            }

            Commands::Release { id, user } => {
                let service = PaymentService::connect(&self.database).await?;
                let transaction = service.release_payment(&id, &user).await?;

                println!(
                    "Released payment {} for {}",
                    transaction.transaction_id,
                    format_cents(transaction.amount)
                );
            }

            Commands::Refund {
                id,
                reason,
                user,
                amount,
            } => {
                let service = PaymentService::connect(&self.database).await?;

                let amount_cents = amount
                    .map(|a| parse_amount(&a))
                    .transpose()
                    .context("Invalid amount format for partial refund")?;

                let refund = service
                    .process_refund(&id, &user, amount_cents, &reason)
                    .await?;

                println!(
                    "Refunded {} as {} (original {})",
                    format_cents(refund.amount),
                    refund.transaction_id,
                    refund
                        .metadata
                        .original_transaction_id
                        .as_deref()
                        .unwrap_or("?")
                );
            }

            Commands::Ledger {
                user,
                kind,
                status,
                from_date,
                to_date,
                limit,
                skip,
            } => {
                let service = PaymentService::connect(&self.database).await?;
                run_ledger_command(
                    &service, &user, kind, status, from_date, to_date, limit, skip,
                )
                .await?;
            }

            Commands::ShowTransaction { id, user } => {
                let service = PaymentService::connect(&self.database).await?;
                match service.get_transaction(&id, &user).await? {
                    Some(transaction) => print_transaction_detail(&transaction),
                    None => println!("Transaction not found: {}", id),
                }
            }

            Commands::Summary { user } => {
                let service = PaymentService::connect(&self.database).await?;
                let summary = service.get_transaction_summary(&user).await?;

                println!("Summary for {}", user);
                println!("  Total payments:   {}", format_cents(summary.total_payments));
                println!("  Total refunds:    {}", format_cents(summary.total_refunds));
                println!("  Pending amount:   {}", format_cents(summary.pending_amount));
                println!("  Completed amount: {}", format_cents(summary.completed_amount));
            }

            Commands::Export {
                format,
                user,
                output,
            } => {
                let service = PaymentService::connect(&self.database).await?;
                run_export_command(&service, &format, &user, output).await?;
            }
        }

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_ledger_command(
    service: &PaymentService,
    user: &str,
    kind: Option<String>,
    status: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    limit: i64,
    skip: i64,
) -> Result<()> {
    let kind_parsed = kind
        .map(|s| {
            TransactionType::from_str(&s)
                .with_context(|| format!("Unknown transaction type '{}'", s))
        })
        .transpose()?;
    let status_parsed = status
        .map(|s| {
            TransactionStatus::from_str(&s)
                .with_context(|| format!("Unknown transaction status '{}'", s))
        })
        .transpose()?;
    let from_date_parsed = from_date
        .map(|s| parse_date(&s))
        .transpose()
        .context("Invalid from-date")?;
    let to_date_parsed = to_date
        .map(|s| parse_date(&s))
        .transpose()
        .context("Invalid to-date")?;

    let filter = LedgerFilter {
        kind: kind_parsed,
        status: status_parsed,
        start_date: from_date_parsed,
        end_date: to_date_parsed,
        limit,
        skip,
    };

    let page = service.get_user_ledger(user, filter).await?;

    if page.transactions.is_empty() {
        println!("No transactions found.");
    } else {
        println!(
            "{:<12} {:<10} {:<10} {:>10} DESCRIPTION",
            "DATE", "KIND", "STATUS", "AMOUNT"
        );
        println!("{}", "-".repeat(70));

        for tx in &page.transactions {
            println!(
                "{:<12} {:<10} {:<10} {:>10} {}",
                tx.created_at.format("%Y-%m-%d"),
                tx.kind.as_str(),
                tx.status.as_str(),
                format_cents(tx.amount),
                truncate(&tx.description, 30)
            );
        }
    }

    println!();
    println!(
        "Showing {} of {} transaction(s). Balance: {}",
        page.transactions.len(),
        page.total,
        format_cents(page.balance)
    );
    Ok(())
}

fn print_transaction_detail(tx: &Transaction) {
    println!("Transaction {}", tx.transaction_id);
    println!("  User:        {}", tx.user_id);
    println!("  Kind:        {}", tx.kind);
    println!("  Status:      {}", tx.status);
    println!("  Amount:      {}", format_cents(tx.amount));
    println!("  Description: {}", tx.description);
    if let Some(quest_id) = &tx.quest_id {
        println!("  Quest:       {}", quest_id);
    }
    if let Some(original) = &tx.metadata.original_transaction_id {
        println!("  Original:    {}", original);
    }
    if let Some(reason) = &tx.metadata.refund_reason {
        println!("  Reason:      {}", reason);
    }
    println!("  Created:     {}", tx.created_at.to_rfc3339());
    if let Some(completed_at) = tx.completed_at {
        println!("  Completed:   {}", completed_at.to_rfc3339());
    }
}

async fn run_export_command(
    service: &PaymentService,
    format: &str,
    user: &str,
    output: Option<String>,
) -> Result<()> {
    let exporter = Exporter::new(service);

    let mut buffer = Vec::new();
    let count = match format {
        "csv" => exporter.export_ledger_csv(user, &mut buffer).await?,
        "json" => {
            let snapshot = exporter.export_ledger_json(user, &mut buffer).await?;
            snapshot.transactions.len()
        }
        other => anyhow::bail!("Unknown export format '{}'. Use csv or json", other),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &buffer)
                .with_context(|| format!("Failed to write export to {}", path))?;
            println!("Exported {} transaction(s) to {}", count, path);
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&buffer)?;
        }
    }

    Ok(())
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}
