// File: soulseer-core/tests/payout_tests.rs

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use rust_decimal::Decimal;
use uuid::Uuid;

use soulseer_core::models::money::usd;
use soulseer_core::models::{
    DepositCheckout, DepositStatus, PayoutAccountStatus, Reader, SessionType, TransactionKind, User,
};
use soulseer_core::payments::PaymentProvider;
use soulseer_core::test_utils::TestMarket;
use soulseer_core::Error;

mock! {
    Provider {}
    #[async_trait]
    impl PaymentProvider for Provider {
        async fn create_deposit(&self, user_id: Uuid, amount: Decimal) -> Result<DepositCheckout, Error>;
        async fn confirm_deposit(&self, provider_session_id: &str) -> Result<DepositStatus, Error>;
        async fn create_payout_account(&self, reader_id: Uuid, email: &str) -> Result<String, Error>;
        async fn create_onboarding_link(&self, account_id: &str) -> Result<String, Error>;
        async fn payout_account_status(&self, account_id: &str) -> Result<PayoutAccountStatus, Error>;
        async fn transfer_payout(&self, account_id: &str, amount: Decimal, idempotency_key: &str) -> Result<String, Error>;
    }
}

/// An onboarded reader holding `pending` in earnings.
async fn onboarded_reader(market: &TestMarket, pending: Decimal) -> Result<(User, Reader), Error> {
    let (user, reader) = market.online_reader("luna").await?;
    market.stores.readers.set_payout_account(reader.reader_id, "acct_1").await?;
    market.stores.readers.mark_payout_onboarded(reader.reader_id).await?;
    if pending > Decimal::ZERO {
        market.ledger.accrue_payout(reader.reader_id, pending).await?;
    }
    Ok((user, reader))
}

#[tokio::test]
async fn test_payout_below_minimum_is_rejected() -> Result<(), Error> {
    let market = TestMarket::new();
    let (user, reader) = onboarded_reader(&market, usd(1200)).await?;

    let mut provider = MockProvider::new();
    provider.expect_transfer_payout().times(0);
    let payouts = market.payouts(Arc::new(provider));

    let err = payouts.payout(user.user_id).await.unwrap_err();
    match err {
        Error::PayoutTooSmall { pending, minimum } => {
            assert_eq!(pending, usd(1200));
            assert_eq!(minimum, usd(1500));
        }
        other => panic!("expected PayoutTooSmall, got {other:?}"),
    }
    assert_eq!(market.reader(reader.reader_id).await?.pending_payout, usd(1200));
    Ok(())
}

#[tokio::test]
async fn test_payout_requires_onboarding() -> Result<(), Error> {
    let market = TestMarket::new();
    let (user, reader) = market.online_reader("luna").await?;
    market.ledger.accrue_payout(reader.reader_id, usd(5000)).await?;

    let mut provider = MockProvider::new();
    provider.expect_transfer_payout().times(0);
    let payouts = market.payouts(Arc::new(provider));

    let err = payouts.payout(user.user_id).await.unwrap_err();
    assert!(matches!(err, Error::OnboardingIncomplete));

    // An account alone is not enough.
    market.stores.readers.set_payout_account(reader.reader_id, "acct_1").await?;
    let err = payouts.payout(user.user_id).await.unwrap_err();
    assert!(matches!(err, Error::OnboardingIncomplete));
    Ok(())
}

#[tokio::test]
async fn test_payout_after_sessions_resets_pending() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(10000)).await?;
    let (reader_user, reader) = onboarded_reader(&market, Decimal::ZERO).await?;

    let mut earned = Decimal::ZERO;
    for secs in [600_i64, 125] {
        let session = market
            .metering
            .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
            .await?;
        market.clock.advance_secs(secs);
        let ended = market.metering.end_session(client.user_id, session.session_id).await?;
        earned += ended.reader_earnings.unwrap_or_default();
    }
    assert_eq!(earned, usd(2793) + usd(838));

    let expected = earned;
    let mut provider = MockProvider::new();
    provider
        .expect_transfer_payout()
        .withf(move |account, amount, key| {
            account.to_string() == "acct_1" && *amount == expected && key.starts_with("payout-")
        })
        .times(1)
        .returning(|_, _, _| Ok("tr_1".to_string()));
    let payouts = market.payouts(Arc::new(provider));

    let record = payouts.payout(reader_user.user_id).await?;
    assert_eq!(record.kind, TransactionKind::Payout);
    assert_eq!(record.amount, -earned);
    assert_eq!(record.reference_id.as_deref(), Some("tr_1"));
    assert_eq!(record.reference_type.as_deref(), Some("stripe_transfer"));

    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, Decimal::ZERO);
    assert_eq!(reader.total_earnings, earned);

    let history = market.ledger.list_transactions(reader_user.user_id).await?;
    assert!(history.iter().any(|t| t.kind == TransactionKind::Payout && t.amount == -earned));
    Ok(())
}

#[tokio::test]
async fn test_failed_transfer_restores_pending() -> Result<(), Error> {
    let market = TestMarket::new();
    let (user, reader) = onboarded_reader(&market, usd(2000)).await?;

    let mut provider = MockProvider::new();
    provider
        .expect_transfer_payout()
        .times(1)
        .returning(|_, _, _| Err(Error::PaymentProvider("account restricted".into())));
    let payouts = market.payouts(Arc::new(provider));

    let err = payouts.payout(user.user_id).await.unwrap_err();
    assert!(matches!(err, Error::PaymentProvider(_)));

    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, usd(2000));
    assert!(market
        .ledger
        .list_transactions(user.user_id)
        .await?
        .iter()
        .all(|t| t.kind != TransactionKind::Payout));
    Ok(())
}

#[tokio::test]
async fn test_onboarding_creates_account_once() -> Result<(), Error> {
    let market = TestMarket::new();
    let (user, reader) = market.online_reader("luna").await?;

    let mut provider = MockProvider::new();
    provider
        .expect_create_payout_account()
        .times(1)
        .returning(|_, _| Ok("acct_new".to_string()));
    provider
        .expect_create_onboarding_link()
        .withf(|account| account.to_string() == "acct_new")
        .times(2)
        .returning(|_| Ok("https://connect.example/onboard".to_string()));
    let payouts = market.payouts(Arc::new(provider));

    assert_eq!(payouts.start_onboarding(user.user_id).await?, "https://connect.example/onboard");
    payouts.start_onboarding(user.user_id).await?;

    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.payout_account_id.as_deref(), Some("acct_new"));
    assert!(!reader.payout_onboarded);
    Ok(())
}

#[tokio::test]
async fn test_refresh_marks_onboarded_when_enabled() -> Result<(), Error> {
    let market = TestMarket::new();
    let (user, reader) = market.online_reader("luna").await?;
    market.stores.readers.set_payout_account(reader.reader_id, "acct_1").await?;

    let mut provider = MockProvider::new();
    let mut calls = 0;
    provider
        .expect_payout_account_status()
        .times(2)
        .returning(move |_| {
            calls += 1;
            Ok(PayoutAccountStatus { details_submitted: true, payouts_enabled: calls > 1 })
        });
    let payouts = market.payouts(Arc::new(provider));

    assert!(!payouts.refresh_onboarding(user.user_id).await?.payout_onboarded);
    assert!(payouts.refresh_onboarding(user.user_id).await?.payout_onboarded);
    // Already onboarded: no further provider call.
    assert!(payouts.refresh_onboarding(user.user_id).await?.payout_onboarded);
    Ok(())
}

#[tokio::test]
async fn test_non_readers_cannot_payout() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(100)).await?;
    let payouts = market.payouts(Arc::new(MockProvider::new()));

    let err = payouts.payout(client.user_id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    Ok(())
}
