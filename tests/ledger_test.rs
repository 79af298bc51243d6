mod common;

use anyhow::Result;
use common::{completed_payment, test_service, USER};
use tavern_ledger::domain::{LedgerFilter, TransactionStatus, TransactionType};

#[tokio::test]
async fn test_balance_counts_completed_payments_and_refunds_only() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // A pending payment does not move the balance
    service
        .create_payment(USER, 7000, "Guard the gate", None, None)
        .await?;
    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.balance, 0);

    // A completed payment is a debit; its release record is not
    let original = completed_payment(&service, USER, 10000, "Slay the dragon").await?;
    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.balance, -10000);

    // A refund is a credit
    service
        .process_refund(&original.transaction_id, USER, Some(4000), "scales damaged")
        .await?;
    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.balance, -6000);

    Ok(())
}

#[tokio::test]
async fn test_balance_is_independent_of_page_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let original = completed_payment(&service, USER, 10000, "Slay the dragon").await?;
    service
        .process_refund(&original.transaction_id, USER, Some(4000), "scales damaged")
        .await?;

    // However the page is filtered, the balance covers the whole account
    for filter in [
        LedgerFilter::default(),
        LedgerFilter {
            kind: Some(TransactionType::Release),
            ..Default::default()
        },
        LedgerFilter {
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        },
        LedgerFilter {
            limit: 1,
            ..Default::default()
        },
    ] {
        let page = service.get_user_ledger(USER, filter).await?;
        assert_eq!(page.balance, -6000);
    }

    Ok(())
}

#[tokio::test]
async fn test_ledger_is_scoped_to_user() -> Result<()> {
    let (service, _temp) = test_service().await?;

    completed_payment(&service, USER, 10000, "Slay the dragon").await?;
    service
        .create_payment("someone-else", 500, "Sweep the floor", None, None)
        .await?;

    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.total, 2); // payment + release record
    assert!(page.transactions.iter().all(|tx| tx.user_id == USER));

    Ok(())
}

#[tokio::test]
async fn test_ledger_filter_by_kind_and_status() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = completed_payment(&service, USER, 10000, "Slay the dragon").await?;
    service
        .create_payment(USER, 3000, "Guard the gate", None, None)
        .await?;
    service
        .process_refund(&first.transaction_id, USER, None, "quest cancelled")
        .await?;

    // 4 records total: 2 payments, 1 release, 1 refund
    let payments = service
        .get_user_ledger(
            USER,
            LedgerFilter {
                kind: Some(TransactionType::Payment),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(payments.total, 2);

    let pending_payments = service
        .get_user_ledger(
            USER,
            LedgerFilter {
                kind: Some(TransactionType::Payment),
                status: Some(TransactionStatus::Pending),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(pending_payments.total, 1);
    assert_eq!(pending_payments.transactions[0].amount, 3000);

    let completed = service
        .get_user_ledger(
            USER,
            LedgerFilter {
                status: Some(TransactionStatus::Completed),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(completed.total, 3); // released payment + release + refund

    Ok(())
}

#[tokio::test]
async fn test_ledger_date_range_is_inclusive() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let payment = service
        .create_payment(USER, 1000, "Gather herbs", None, None)
        .await?;

    // Bounds that exactly bracket the record's timestamp keep it in range
    let filter = LedgerFilter {
        start_date: Some(payment.created_at),
        end_date: Some(payment.created_at),
        ..Default::default()
    };
    let page = service.get_user_ledger(USER, filter).await?;
    assert_eq!(page.total, 1);

    // A range strictly before the record excludes it
    let filter = LedgerFilter {
        end_date: Some(payment.created_at - chrono::Duration::seconds(1)),
        ..Default::default()
    };
    let page = service.get_user_ledger(USER, filter).await?;
    assert_eq!(page.total, 0);

    // A range strictly after the record excludes it too
    let filter = LedgerFilter {
        start_date: Some(payment.created_at + chrono::Duration::seconds(1)),
        ..Default::default()
    };
    let page = service.get_user_ledger(USER, filter).await?;
    assert_eq!(page.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_ledger_orders_most_recent_first() -> Result<()> {
    let (service, _temp) = test_service().await?;

    for i in 1..=5 {
        service
            .create_payment(USER, i * 100, "Gather herbs", None, None)
            .await?;
    }

    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    let amounts: Vec<i64> = page.transactions.iter().map(|tx| tx.amount).collect();
    assert_eq!(amounts, vec![500, 400, 300, 200, 100]);

    Ok(())
}

#[tokio::test]
async fn test_ledger_pagination() -> Result<()> {
    let (service, _temp) = test_service().await?;

    for i in 1..=60 {
        service
            .create_payment(USER, i * 100, "Gather herbs", None, None)
            .await?;
    }

    let page = service
        .get_user_ledger(
            USER,
            LedgerFilter {
                limit: 20,
                skip: 40,
                ..Default::default()
            },
        )
        .await?;

    // Descending order: skipping the 40 newest leaves the 20 oldest
    assert_eq!(page.total, 60);
    assert_eq!(page.transactions.len(), 20);
    let amounts: Vec<i64> = page.transactions.iter().map(|tx| tx.amount).collect();
    let expected: Vec<i64> = (1..=20).rev().map(|i| i * 100).collect();
    assert_eq!(amounts, expected);

    Ok(())
}

#[tokio::test]
async fn test_ledger_default_page_size() -> Result<()> {
    let (service, _temp) = test_service().await?;

    for i in 1..=60 {
        service
            .create_payment(USER, i * 100, "Gather herbs", None, None)
            .await?;
    }

    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.total, 60);
    assert_eq!(page.transactions.len(), 50);

    Ok(())
}

#[tokio::test]
async fn test_full_quest_payment_lifecycle() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // Pay 100 for a sword
    let payment = service
        .create_payment(USER, 10000, "sword", None, None)
        .await?;
    assert_eq!(payment.status, TransactionStatus::Pending);

    // Release it: original completes, one release record appears
    let released = service
        .release_payment(&payment.transaction_id, USER)
        .await?;
    assert_eq!(released.status, TransactionStatus::Completed);

    let releases = service
        .get_user_ledger(
            USER,
            LedgerFilter {
                kind: Some(TransactionType::Release),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(releases.total, 1);
    assert_eq!(releases.transactions[0].amount, 10000);

    // Refund it fully: balance returns to zero
    service
        .process_refund(&payment.transaction_id, USER, None, "returned the sword")
        .await?;

    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.balance, 0);

    Ok(())
}

#[tokio::test]
async fn test_partial_refund_lifecycle() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let payment = completed_payment(&service, USER, 5000, "shield").await?;
    service
        .process_refund(&payment.transaction_id, USER, Some(2000), "damaged")
        .await?;

    let page = service.get_user_ledger(USER, LedgerFilter::default()).await?;
    assert_eq!(page.balance, -3000);

    let summary = service.get_transaction_summary(USER).await?;
    assert_eq!(summary.completed_amount, 5000);
    assert_eq!(summary.total_refunds, 2000);

    Ok(())
}
