// soulseer-core/src/repositories/memory/mod.rs
//
// A process-local store implementing every repository trait. Used for local
// development without Postgres and by the test suite.
//
// All state sits behind one mutex, so each trait method (settlement included)
// runs as a single atomic unit: it validates first and only then mutates.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use soulseer_common::models::{
    Message, PayoutReservation, Reader, ReaderRates, Session, SessionStatus, Settlement,
    Transaction, TransactionKind, User, UserRole,
};
use soulseer_common::traits::repository_traits::{
    LedgerRepository, MessageRepository, ReaderRepository, SessionRepository, UserRepository,
};
use crate::Error;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    readers: HashMap<Uuid, Reader>,
    sessions: HashMap<Uuid, Session>,
    messages: Vec<Message>,
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        if st.users.values().any(|u| u.email == user.email || u.username == user.username) {
            return Err(Error::Validation("Email or username already registered".into()));
        }
        st.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, Error> {
        let st = self.state.lock().await;
        let users = st.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>, Error> {
        let st = self.state.lock().await;
        let users = st.users.values().filter(|u| u.role == role).cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        let user = st.users.get_mut(&user_id).ok_or(Error::UserNotFound(user_id))?;
        user.role = role;
        Ok(())
    }
}

impl InMemoryStore {
    async fn update_reader<F>(&self, reader_id: Uuid, f: F) -> Result<Option<Reader>, Error>
    where
        F: FnOnce(&mut Reader) + Send,
    {
        let mut st = self.state.lock().await;
        Ok(st.readers.get_mut(&reader_id).map(|r| {
            f(r);
            r.clone()
        }))
    }
}

#[async_trait]
impl ReaderRepository for InMemoryStore {
    async fn create_reader(&self, reader: &Reader) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        if st.readers.values().any(|r| r.user_id == reader.user_id) {
            return Err(Error::Validation("User already has a reader profile".into()));
        }
        st.readers.insert(reader.reader_id, reader.clone());
        Ok(())
    }

    async fn get_reader(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        Ok(self.state.lock().await.readers.get(&reader_id).cloned())
    }

    async fn get_reader_by_user_id(&self, user_id: Uuid) -> Result<Option<Reader>, Error> {
        let st = self.state.lock().await;
        Ok(st.readers.values().find(|r| r.user_id == user_id).cloned())
    }

    async fn set_online(&self, reader_id: Uuid, is_online: bool) -> Result<Option<Reader>, Error> {
        self.update_reader(reader_id, |r| r.is_online = is_online).await
    }

    async fn update_rates(&self, reader_id: Uuid, rates: &ReaderRates) -> Result<Option<Reader>, Error> {
        let rates = *rates;
        self.update_reader(reader_id, move |r| {
            r.chat_rate = rates.chat_rate;
            r.voice_rate = rates.voice_rate;
            r.video_rate = rates.video_rate;
        })
        .await
    }

    async fn approve(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        self.update_reader(reader_id, |r| r.is_approved = true).await
    }

    async fn set_payout_account(&self, reader_id: Uuid, account_id: &str) -> Result<Option<Reader>, Error> {
        let account_id = account_id.to_string();
        self.update_reader(reader_id, move |r| r.payout_account_id = Some(account_id)).await
    }

    async fn mark_payout_onboarded(&self, reader_id: Uuid) -> Result<Option<Reader>, Error> {
        self.update_reader(reader_id, |r| r.payout_onboarded = true).await
    }

    async fn list_readers(&self) -> Result<Vec<Reader>, Error> {
        let st = self.state.lock().await;
        let readers = st.readers.values().cloned().collect();
        Ok(newest_first(readers, |r: &Reader| r.created_at))
    }

    async fn list_approved_readers(&self) -> Result<Vec<Reader>, Error> {
        let st = self.state.lock().await;
        let readers = st.readers.values().filter(|r| r.is_approved).cloned().collect();
        Ok(newest_first(readers, |r: &Reader| r.created_at))
    }

    async fn list_online_readers(&self) -> Result<Vec<Reader>, Error> {
        let st = self.state.lock().await;
        let readers = st.readers.values().filter(|r| r.is_available()).cloned().collect();
        Ok(newest_first(readers, |r: &Reader| r.created_at))
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn create_session(&self, session: &Session) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        let has_active = st
            .sessions
            .values()
            .any(|s| s.client_id == session.client_id && s.is_active());
        if session.is_active() && has_active {
            return Err(Error::SessionAlreadyActive);
        }
        st.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, Error> {
        Ok(self.state.lock().await.sessions.get(&session_id).cloned())
    }

    async fn list_sessions_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, Error> {
        let st = self.state.lock().await;
        let sessions = st.sessions.values().filter(|s| s.client_id == client_id).cloned().collect();
        Ok(newest_first(sessions, |s: &Session| s.created_at))
    }

    async fn list_sessions_for_reader(&self, reader_id: Uuid) -> Result<Vec<Session>, Error> {
        let st = self.state.lock().await;
        let sessions = st.sessions.values().filter(|s| s.reader_id == reader_id).cloned().collect();
        Ok(newest_first(sessions, |s: &Session| s.created_at))
    }

    async fn list_active_sessions(&self) -> Result<Vec<Session>, Error> {
        let st = self.state.lock().await;
        Ok(st.sessions.values().filter(|s| s.is_active()).cloned().collect())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, Error> {
        let st = self.state.lock().await;
        let sessions = st.sessions.values().cloned().collect();
        Ok(newest_first(sessions, |s: &Session| s.created_at))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create_message(&self, message: &Message) -> Result<(), Error> {
        self.state.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages_for_session(&self, session_id: Uuid) -> Result<Vec<Message>, Error> {
        let st = self.state.lock().await;
        let mut msgs: Vec<Message> = st
            .messages
            .iter()
            .filter(|m| m.session_id == Some(session_id))
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order.
        msgs.sort_by_key(|m| m.created_at);
        Ok(msgs)
    }

    async fn list_messages_for_user(&self, user_id: Uuid) -> Result<Vec<Message>, Error> {
        let st = self.state.lock().await;
        // Reversed insertion order first, so the stable sort keeps later inserts ahead on ties.
        let msgs: Vec<Message> = st
            .messages
            .iter()
            .rev()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(msgs, |m: &Message| m.created_at))
    }

    async fn mark_messages_read(&self, sender_id: Uuid, receiver_id: Uuid) -> Result<u64, Error> {
        let mut st = self.state.lock().await;
        let mut changed = 0;
        for m in st.messages.iter_mut() {
            if m.sender_id == sender_id && m.receiver_id == receiver_id && !m.is_read {
                m.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn credit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Decimal, Error> {
        let mut st = self.state.lock().await;
        let user = st.users.get_mut(&user_id).ok_or(Error::UserNotFound(user_id))?;
        user.balance += amount;
        let balance = user.balance;
        st.transactions.push(record.clone());
        Ok(balance)
    }

    async fn debit_balance(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error> {
        let mut st = self.state.lock().await;
        let user = st.users.get_mut(&user_id).ok_or(Error::UserNotFound(user_id))?;
        if user.balance < amount {
            return Ok(None);
        }
        user.balance -= amount;
        let balance = user.balance;
        st.transactions.push(record.clone());
        Ok(Some(balance))
    }

    async fn credit_deposit(&self, user_id: Uuid, amount: Decimal, record: &Transaction) -> Result<Option<Decimal>, Error> {
        let mut st = self.state.lock().await;
        let already = st.transactions.iter().any(|t| {
            t.kind == TransactionKind::Deposit && t.reference_id.is_some() && t.reference_id == record.reference_id
        });
        if already {
            return Ok(None);
        }
        let user = st.users.get_mut(&user_id).ok_or(Error::UserNotFound(user_id))?;
        user.balance += amount;
        let balance = user.balance;
        st.transactions.push(record.clone());
        Ok(Some(balance))
    }

    async fn accrue_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        let reader = st.readers.get_mut(&reader_id).ok_or(Error::ReaderNotFound(reader_id))?;
        reader.pending_payout += amount;
        reader.total_earnings += amount;
        Ok(())
    }

    async fn settle_session(&self, settlement: &Settlement) -> Result<Option<Session>, Error> {
        let mut st = self.state.lock().await;

        // Validate everything before touching anything.
        match st.sessions.get(&settlement.session_id) {
            None => return Err(Error::SessionNotFound(settlement.session_id)),
            Some(s) if s.status != SessionStatus::Active => return Ok(None),
            Some(_) => {}
        }
        if !st.users.contains_key(&settlement.client_id) {
            return Err(Error::SettlementFailure(format!("client {} missing", settlement.client_id)));
        }
        if !st.readers.contains_key(&settlement.reader_id) {
            return Err(Error::SettlementFailure(format!("reader {} missing", settlement.reader_id)));
        }

        let c = settlement.charges;
        let session = match st.sessions.get_mut(&settlement.session_id) {
            Some(s) => {
                s.status = SessionStatus::Completed;
                s.ended_at = Some(settlement.ended_at);
                s.duration_minutes = Some(c.duration_minutes as i32);
                s.total_cost = Some(c.total_cost);
                s.reader_earnings = Some(c.reader_earnings);
                s.platform_fee = Some(c.platform_fee);
                s.end_reason = Some(settlement.end_reason);
                s.clone()
            }
            None => return Err(Error::SessionNotFound(settlement.session_id)),
        };
        if let Some(client) = st.users.get_mut(&settlement.client_id) {
            client.balance -= c.total_cost;
        }
        if let Some(reader) = st.readers.get_mut(&settlement.reader_id) {
            reader.pending_payout += c.reader_earnings;
            reader.total_earnings += c.reader_earnings;
            reader.total_readings += 1;
        }
        st.transactions.push(settlement.client_charge.clone());
        st.transactions.push(settlement.reader_earning.clone());

        Ok(Some(session))
    }

    async fn reserve_pending_payout(&self, reader_id: Uuid, minimum: Decimal) -> Result<PayoutReservation, Error> {
        let mut st = self.state.lock().await;
        let reader = st.readers.get_mut(&reader_id).ok_or(Error::ReaderNotFound(reader_id))?;
        let pending = reader.pending_payout;
        if pending < minimum {
            return Ok(PayoutReservation::BelowMinimum(pending));
        }
        reader.pending_payout = Decimal::ZERO;
        Ok(PayoutReservation::Reserved(pending))
    }

    async fn restore_pending_payout(&self, reader_id: Uuid, amount: Decimal) -> Result<(), Error> {
        let mut st = self.state.lock().await;
        let reader = st.readers.get_mut(&reader_id).ok_or(Error::ReaderNotFound(reader_id))?;
        reader.pending_payout += amount;
        Ok(())
    }

    async fn record_transaction(&self, record: &Transaction) -> Result<(), Error> {
        self.state.lock().await.transactions.push(record.clone());
        Ok(())
    }

    async fn list_transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>, Error> {
        let st = self.state.lock().await;
        let txs = st.transactions.iter().filter(|t| t.user_id == user_id).cloned().collect();
        Ok(newest_first(txs, |t: &Transaction| t.created_at))
    }
}
