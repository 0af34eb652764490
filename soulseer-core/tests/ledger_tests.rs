// File: soulseer-core/tests/ledger_tests.rs

use rust_decimal::Decimal;

use soulseer_core::models::money::usd;
use soulseer_core::models::TransactionKind;
use soulseer_core::test_utils::TestMarket;
use soulseer_core::Error;

const PURCHASE: (&str, &str) = ("order-1", "order");

#[tokio::test]
async fn test_debit_and_credit_record_transactions() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", usd(5000)).await?;

    let after_debit = market
        .ledger
        .debit(user.user_id, usd(1250), TransactionKind::Purchase, "Crystal set", PURCHASE)
        .await?;
    assert_eq!(after_debit, usd(3750));

    let after_credit = market
        .ledger
        .credit(user.user_id, usd(250), TransactionKind::Deposit, "Refund", ("order-1", "order"))
        .await?;
    assert_eq!(after_credit, usd(4000));

    let txs = market.ledger.list_transactions(user.user_id).await?;
    assert_eq!(txs.len(), 2);
    let amounts: Vec<Decimal> = txs.iter().map(|t| t.amount).collect();
    assert!(amounts.contains(&-usd(1250)));
    assert!(amounts.contains(&usd(250)));
    Ok(())
}

#[tokio::test]
async fn test_debit_never_overdraws() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", usd(5000)).await?;

    let err = market
        .ledger
        .debit(user.user_id, usd(6000), TransactionKind::Purchase, "Too much", PURCHASE)
        .await
        .unwrap_err();
    match err {
        Error::InsufficientBalance { required, available } => {
            assert_eq!(required, usd(6000));
            assert_eq!(available, usd(5000));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert_eq!(market.balance_of(user.user_id).await?, usd(5000));
    assert!(market.ledger.list_transactions(user.user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_amounts_are_validated() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", usd(5000)).await?;

    for bad in [Decimal::ZERO, -usd(100), Decimal::new(1005, 3)] {
        let err = market
            .ledger
            .debit(user.user_id, bad, TransactionKind::Purchase, "bad", PURCHASE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)), "{bad} should be rejected");
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_debits_lose_no_updates() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", usd(10000)).await?;

    let mut handles = Vec::new();
    for i in 0..50 {
        let ledger = market.ledger.clone();
        let user_id = user.user_id;
        handles.push(tokio::spawn(async move {
            let reference = format!("order-{i}");
            ledger
                .debit(user_id, usd(100), TransactionKind::Purchase, "Candle", (reference.as_str(), "order"))
                .await
        }));
    }
    for h in handles {
        h.await.expect("task should not panic")?;
    }

    assert_eq!(market.balance_of(user.user_id).await?, usd(5000));
    assert_eq!(market.ledger.list_transactions(user.user_id).await?.len(), 50);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_debits_stop_at_zero() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", usd(500)).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = market.ledger.clone();
        let user_id = user.user_id;
        handles.push(tokio::spawn(async move {
            ledger
                .debit(user_id, usd(100), TransactionKind::Purchase, "Candle", ("order", "order"))
                .await
        }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.expect("task should not panic").is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(market.balance_of(user.user_id).await?, Decimal::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_accrue_payout_moves_both_fields() -> Result<(), Error> {
    let market = TestMarket::new();
    let (_, reader) = market.online_reader("luna").await?;

    market.ledger.accrue_payout(reader.reader_id, usd(838)).await?;
    market.ledger.accrue_payout(reader.reader_id, usd(279)).await?;

    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, usd(1117));
    assert_eq!(reader.total_earnings, usd(1117));
    Ok(())
}

#[tokio::test]
async fn test_deposit_reference_credits_once() -> Result<(), Error> {
    let market = TestMarket::new();
    let user = market.client_with_balance("seeker", Decimal::ZERO).await?;

    let first = market.ledger.credit_deposit(user.user_id, usd(2500), "cs_1", "stripe_checkout").await?;
    let second = market.ledger.credit_deposit(user.user_id, usd(2500), "cs_1", "stripe_checkout").await?;

    assert_eq!(first, Some(usd(2500)));
    assert_eq!(second, None);
    assert_eq!(market.balance_of(user.user_id).await?, usd(2500));
    Ok(())
}
