// File: soulseer-core/tests/metering_tests.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use soulseer_core::models::money::usd;
use soulseer_core::models::{EndReason, ReaderRates, SessionStatus, SessionType, TransactionKind};
use soulseer_core::test_utils::TestMarket;
use soulseer_core::Error;

#[tokio::test]
async fn test_three_minute_chat_settles_exactly() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.rate_per_minute, usd(399));

    market.clock.advance_secs(125);
    let ended = market.metering.end_session(client.user_id, session.session_id).await?;

    assert_eq!(ended.status, SessionStatus::Completed);
    assert_eq!(ended.duration_minutes, Some(3));
    assert_eq!(ended.total_cost, Some(usd(1197)));
    assert_eq!(ended.reader_earnings, Some(usd(838)));
    assert_eq!(ended.platform_fee, Some(usd(359)));
    assert_eq!(ended.end_reason, Some(EndReason::Participant));

    assert_eq!(market.balance_of(client.user_id).await?, usd(3803));
    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, usd(838));
    assert_eq!(reader.total_earnings, usd(838));
    assert_eq!(reader.total_readings, 1);

    let client_txs = market.ledger.list_transactions(client.user_id).await?;
    assert_eq!(client_txs.len(), 1);
    assert_eq!(client_txs[0].kind, TransactionKind::SessionCharge);
    assert_eq!(client_txs[0].amount, -usd(1197));
    assert_eq!(client_txs[0].reference_id.as_deref(), Some(session.session_id.to_string().as_str()));

    let reader_txs = market.ledger.list_transactions(reader_user.user_id).await?;
    assert_eq!(reader_txs.len(), 1);
    assert_eq!(reader_txs[0].kind, TransactionKind::SessionEarning);
    assert_eq!(reader_txs[0].amount, usd(838));
    Ok(())
}

#[tokio::test]
async fn test_start_below_floor_is_rejected() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(1000)).await?;
    let (_, reader) = market.online_reader("raven").await?;

    let err = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Voice, usd(499))
        .await
        .unwrap_err();

    match err {
        Error::InsufficientBalance { required, available } => {
            assert_eq!(required, usd(1497));
            assert_eq!(available, usd(1000));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert!(market.metering.list_for_client(client.user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_floor_boundary_is_inclusive() -> Result<(), Error> {
    let market = TestMarket::new();
    let exact = market.client_with_balance("exact", usd(1197)).await?;
    let short = market.client_with_balance("short", usd(1196)).await?;
    let (_, reader) = market.online_reader("luna").await?;

    market
        .metering
        .start_session(exact.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;

    let err = market
        .metering
        .start_session(short.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
    Ok(())
}

#[tokio::test]
async fn test_unavailable_readers_cannot_be_booked() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (_, offline) = market.reader_with("offline", ReaderRates::default(), false, true).await?;
    let (_, unapproved) = market.reader_with("pending", ReaderRates::default(), true, false).await?;

    for reader_id in [offline.reader_id, unapproved.reader_id, Uuid::new_v4()] {
        let err = market
            .metering
            .start_session(client.user_id, reader_id, SessionType::Chat, usd(399))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReaderUnavailable), "got {err:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_quoted_rate_must_match_current_rate() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (_, reader) = market.online_reader("luna").await?;

    let err = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Video, usd(1))
        .await
        .unwrap_err();
    match err {
        Error::RateChanged { quoted, current } => {
            assert_eq!(quoted, usd(1));
            assert_eq!(current, usd(599));
        }
        other => panic!("expected RateChanged, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_reader_cannot_book_themselves() -> Result<(), Error> {
    let market = TestMarket::new();
    let (reader_user, reader) = market.online_reader("luna").await?;

    let err = market
        .metering
        .start_session(reader_user.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn test_one_active_session_per_client() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(10000)).await?;
    let (_, luna) = market.online_reader("luna").await?;
    let (_, raven) = market.online_reader("raven").await?;

    let first = market
        .metering
        .start_session(client.user_id, luna.reader_id, SessionType::Chat, usd(399))
        .await?;
    let err = market
        .metering
        .start_session(client.user_id, raven.reader_id, SessionType::Chat, usd(399))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionAlreadyActive));

    // Once the first ends, a new one may start.
    market.metering.end_session(client.user_id, first.session_id).await?;
    market
        .metering
        .start_session(client.user_id, raven.reader_id, SessionType::Chat, usd(399))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_rate_snapshot_survives_rate_change() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;
    market
        .readers
        .update_rates(
            reader_user.user_id,
            reader.reader_id,
            ReaderRates { chat_rate: usd(999), voice_rate: usd(999), video_rate: usd(999) },
        )
        .await?;

    market.clock.advance_secs(60);
    let ended = market.metering.end_session(reader_user.user_id, session.session_id).await?;
    assert_eq!(ended.total_cost, Some(usd(399)));
    Ok(())
}

#[tokio::test]
async fn test_second_end_moves_no_money() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;
    market.clock.advance_secs(125);
    let first = market.metering.end_session(client.user_id, session.session_id).await?;

    let balance_after_first = market.balance_of(client.user_id).await?;
    let pending_after_first = market.reader(reader.reader_id).await?.pending_payout;

    market.clock.advance_secs(600);
    let second = market.metering.end_session(reader_user.user_id, session.session_id).await?;

    assert_eq!(second.ended_at, first.ended_at);
    assert_eq!(second.total_cost, first.total_cost);
    assert_eq!(market.balance_of(client.user_id).await?, balance_after_first);
    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, pending_after_first);
    assert_eq!(reader.total_readings, 1);
    assert_eq!(market.ledger.list_transactions(client.user_id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_ends_settle_once() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;
    market.clock.advance_secs(90);

    let m1 = market.metering.clone();
    let m2 = market.metering.clone();
    let (a, b) = tokio::join!(
        m1.end_session(client.user_id, session.session_id),
        m2.end_session(reader_user.user_id, session.session_id),
    );
    assert_eq!(a?.total_cost, b?.total_cost);

    assert_eq!(market.balance_of(client.user_id).await?, usd(5000) - usd(798));
    assert_eq!(market.reader(reader.reader_id).await?.total_readings, 1);
    Ok(())
}

#[tokio::test]
async fn test_only_participants_may_end_or_view() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let stranger = market.client_with_balance("stranger", usd(5000)).await?;
    let (_, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;

    let err = market.metering.end_session(stranger.user_id, session.session_id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    let err = market.metering.get_session(stranger.user_id, session.session_id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let missing = Uuid::new_v4();
    let err = market.metering.end_session(client.user_id, missing).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(id) if id == missing));

    assert!(market.metering.get_session(client.user_id, session.session_id).await?.is_active());
    Ok(())
}

#[tokio::test]
async fn test_pending_payout_is_sum_of_earnings() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(20000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let mut expected = Decimal::ZERO;
    for secs in [30_i64, 125, 600, 61] {
        let session = market
            .metering
            .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
            .await?;
        market.clock.advance_secs(secs);
        let ended = market.metering.end_session(client.user_id, session.session_id).await?;

        let total = ended.total_cost.unwrap_or_default();
        let earnings = ended.reader_earnings.unwrap_or_default();
        let fee = ended.platform_fee.unwrap_or_default();
        assert_eq!(total, Decimal::from(ended.duration_minutes.unwrap_or_default()) * usd(399));
        assert_eq!(earnings + fee, total);
        expected += earnings;
    }

    let reader = market.reader(reader.reader_id).await?;
    assert_eq!(reader.pending_payout, expected);
    assert_eq!(reader.total_earnings, expected);
    assert_eq!(reader.total_readings, 4);

    let history = market.metering.list_for_reader(reader_user.user_id).await?;
    assert_eq!(history.len(), 4);
    assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    Ok(())
}

#[tokio::test]
async fn test_session_lifecycle_is_broadcast() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (reader_user, reader) = market.online_reader("luna").await?;

    let session = market
        .metering
        .start_session(client.user_id, reader.reader_id, SessionType::Chat, usd(399))
        .await?;

    let (conn, mut rx) = market.channels.connect(Some(reader_user.user_id));
    market.channels.join(session.session_id, &conn).await;

    market.clock.advance_secs(125);
    market.metering.end_session(client.user_id, session.session_id).await?;

    let frame = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("session_ended frame in time")
        .expect("channel open");
    let frame: Value = serde_json::from_str(&frame)?;
    assert_eq!(frame["type"], "session_ended");
    assert_eq!(frame["duration"], 3);
    assert_eq!(frame["totalCost"], "11.97");
    assert_eq!(frame["reason"], "participant");
    assert_eq!(frame["session"]["status"], "completed");
    Ok(())
}

#[tokio::test]
async fn test_running_cost_tracks_clock() -> Result<(), Error> {
    let market = TestMarket::new();
    let client = market.client_with_balance("seeker", usd(5000)).await?;
    let (_, reader) = market.online_reader("luna").await?;
    let metering = Arc::clone(&market.metering);

    let session = metering
        .start_session(client.user_id, reader.reader_id, SessionType::Voice, usd(499))
        .await?;
    assert_eq!(metering.running_cost(&session), Some(usd(499)));

    market.clock.advance_secs(150);
    assert_eq!(metering.running_cost(&session), Some(usd(1497)));

    let ended = metering.end_session(client.user_id, session.session_id).await?;
    assert_eq!(metering.running_cost(&ended), None);
    Ok(())
}
