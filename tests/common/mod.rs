// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tavern_ledger::application::PaymentService;
use tavern_ledger::domain::{Cents, Transaction};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(PaymentService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = PaymentService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub const USER: &str = "adventurer-1";
pub const OTHER_USER: &str = "adventurer-2";

/// Create a payment and immediately release it, returning the completed
/// original. Most refund scenarios start from here.
pub async fn completed_payment(
    service: &PaymentService,
    user: &str,
    amount: Cents,
    description: &str,
) -> Result<Transaction> {
    let payment = service
        .create_payment(user, amount, description, None, None)
        .await?;
    let released = service
        .release_payment(&payment.transaction_id, user)
        .await?;
    Ok(released)
}
