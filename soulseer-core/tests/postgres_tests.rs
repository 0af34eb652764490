// File: soulseer-core/tests/postgres_tests.rs
//
// Runs against a real database. Set TEST_DATABASE_URL and run with
// `--ignored`.

use chrono::{Duration, Utc};
use uuid::Uuid;

use soulseer_core::models::money::usd;
use soulseer_core::models::{
    EndReason, Message, PayoutReservation, Reader, ReaderRates, Session, SessionCharges, SessionStatus,
    SessionType, Settlement, Transaction, TransactionKind, User, UserRole,
};
use soulseer_core::repositories::Stores;
use soulseer_core::test_utils::helpers::setup_test_database;
use soulseer_core::Error;

async fn seed(stores: &Stores) -> Result<(User, Reader), Error> {
    let mut client = User::new("pg_client", "pg_client@example.com", UserRole::Client);
    client.balance = usd(5000);
    stores.users.create_user(&client).await?;

    let reader_user = User::new("pg_reader", "pg_reader@example.com", UserRole::Reader);
    stores.users.create_user(&reader_user).await?;
    let mut reader = Reader::new(reader_user.user_id, "PG Reader", ReaderRates::default());
    reader.is_online = true;
    reader.is_approved = true;
    stores.readers.create_reader(&reader).await?;

    Ok((client, reader))
}

fn settlement_for(session: &Session, reader: &Reader, ended_secs: i64) -> Settlement {
    let started = session.started_at.unwrap_or(session.created_at);
    let ended_at = started + Duration::seconds(ended_secs);
    let charges = SessionCharges::compute(session.rate_per_minute, started, ended_at, rust_decimal::Decimal::new(70, 2));
    let reference = session.session_id.to_string();
    Settlement {
        session_id: session.session_id,
        client_id: session.client_id,
        reader_id: session.reader_id,
        ended_at,
        end_reason: EndReason::Participant,
        charges,
        client_charge: Transaction::new(session.client_id, TransactionKind::SessionCharge, -charges.total_cost, "charge", &reference, "session"),
        reader_earning: Transaction::new(reader.user_id, TransactionKind::SessionEarning, charges.reader_earnings, "earning", &reference, "session"),
    }
}

#[tokio::test]
#[ignore]
async fn test_postgres_settlement_is_guarded() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let stores = Stores::postgres(db.pool().clone());
    let (client, reader) = seed(&stores).await?;

    let session = Session::start(client.user_id, reader.reader_id, SessionType::Chat, usd(399), Utc::now());
    stores.sessions.create_session(&session).await?;

    let second = Session::start(client.user_id, reader.reader_id, SessionType::Chat, usd(399), Utc::now());
    let err = stores.sessions.create_session(&second).await.unwrap_err();
    assert!(matches!(err, Error::SessionAlreadyActive));

    let settlement = settlement_for(&session, &reader, 125);
    let done = stores.ledger.settle_session(&settlement).await?.expect("first settlement applies");
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.total_cost, Some(usd(1197)));

    // A replay with fresh transaction ids changes nothing.
    let replay = settlement_for(&session, &reader, 600);
    assert!(stores.ledger.settle_session(&replay).await?.is_none());

    let client = stores.users.get_user(client.user_id).await?.expect("client exists");
    assert_eq!(client.balance, usd(3803));
    let reader = stores.readers.get_reader(reader.reader_id).await?.expect("reader exists");
    assert_eq!(reader.pending_payout, usd(838));
    assert_eq!(reader.total_readings, 1);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_postgres_payout_reservation_and_deposits() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let stores = Stores::postgres(db.pool().clone());
    let (client, reader) = seed(&stores).await?;

    stores.ledger.accrue_payout(reader.reader_id, usd(1200)).await?;
    assert_eq!(
        stores.ledger.reserve_pending_payout(reader.reader_id, usd(1500)).await?,
        PayoutReservation::BelowMinimum(usd(1200))
    );
    stores.ledger.accrue_payout(reader.reader_id, usd(400)).await?;
    assert_eq!(
        stores.ledger.reserve_pending_payout(reader.reader_id, usd(1500)).await?,
        PayoutReservation::Reserved(usd(1600))
    );
    assert_eq!(
        stores.ledger.reserve_pending_payout(reader.reader_id, usd(1500)).await?,
        PayoutReservation::BelowMinimum(usd(0))
    );

    let deposit = |id: &str| {
        Transaction::new(client.user_id, TransactionKind::Deposit, usd(2500), "deposit", id, "stripe_checkout")
    };
    assert_eq!(stores.ledger.credit_deposit(client.user_id, usd(2500), &deposit("cs_pg")).await?, Some(usd(7500)));
    assert_eq!(stores.ledger.credit_deposit(client.user_id, usd(2500), &deposit("cs_pg")).await?, None);

    let missing = Uuid::new_v4();
    assert!(stores.ledger.debit_balance(missing, usd(100), &deposit("x")).await.is_err());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_postgres_reader_profiles_and_listings() -> Result<(), Error> {
    let db = setup_test_database().await?;
    db.ping().await?;
    let stores = Stores::postgres(db.pool().clone());
    let (client, reader) = seed(&stores).await?;

    // One profile per account, enforced by the column's UNIQUE.
    let duplicate = Reader::new(reader.user_id, "Second Profile", ReaderRates::default());
    let err = stores.readers.create_reader(&duplicate).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err:?}");

    let mut pending_user = User::new("pg_pending", "pg_pending@example.com", UserRole::Client);
    pending_user.created_at = Utc::now() + Duration::seconds(1);
    stores.users.create_user(&pending_user).await?;
    let mut pending = Reader::new(pending_user.user_id, "Pending", ReaderRates::default());
    pending.created_at = Utc::now() + Duration::seconds(1);
    stores.readers.create_reader(&pending).await?;
    stores.users.set_role(pending_user.user_id, UserRole::Reader).await?;

    let users = stores.users.list_users().await?;
    assert_eq!(users.len(), 3);
    assert_eq!(users[0].user_id, pending_user.user_id);
    assert_eq!(users[0].role, UserRole::Reader);
    assert!(matches!(
        stores.users.set_role(Uuid::new_v4(), UserRole::Reader).await,
        Err(Error::UserNotFound(_))
    ));

    let readers = stores.readers.list_readers().await?;
    assert_eq!(readers.len(), 2);
    assert_eq!(readers[0].reader_id, pending.reader_id);
    assert_eq!(stores.readers.list_approved_readers().await?.len(), 1);

    let session = Session::start(client.user_id, reader.reader_id, SessionType::Chat, usd(399), Utc::now());
    stores.sessions.create_session(&session).await?;
    assert_eq!(stores.sessions.list_sessions().await?.len(), 1);

    let now = Utc::now();
    let first = Message::new(client.user_id, reader.user_id, Some(session.session_id), "first", now);
    let reply = Message::new(reader.user_id, client.user_id, Some(session.session_id), "reply", now);
    stores.messages.create_message(&first).await?;
    stores.messages.create_message(&reply).await?;

    // Same timestamp: insertion order breaks the tie, newest first.
    let mine = stores.messages.list_messages_for_user(client.user_id).await?;
    let ids: Vec<Uuid> = mine.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![reply.message_id, first.message_id]);
    assert!(stores.messages.list_messages_for_user(pending_user.user_id).await?.is_empty());
    Ok(())
}
