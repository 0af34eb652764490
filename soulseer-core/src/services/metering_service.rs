// File: src/services/metering_service.rs
//
// Owns the session state machine: start (availability, rate and balance
// checks), settle (duration, cost and the 70/30 split, applied atomically by
// the ledger store) and the read side used by the API.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use soulseer_common::models::{
    EndReason, Session, SessionCharges, SessionStatus, SessionType, Settlement, Transaction,
    TransactionKind,
};
use crate::clock::Clock;
use crate::config::MeteringConfig;
use crate::eventbus::{EventBus, MarketEvent};
use crate::realtime::{ChannelManager, RealtimeEvent};
use crate::repositories::Stores;
use crate::services::{load_reader, load_session, reader_for_user, session_for_participant};
use crate::Error;

pub const SESSION_REFERENCE: &str = "session";

pub struct MeteringService {
    stores: Stores,
    channels: Arc<ChannelManager>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: MeteringConfig,
}

impl MeteringService {
    pub fn new(
        stores: Stores,
        channels: Arc<ChannelManager>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: MeteringConfig,
    ) -> Self {
        Self { stores, channels, event_bus, clock, config }
    }

    pub fn config(&self) -> &MeteringConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Opens an `active` session for `client_id` with `reader_id`.
    ///
    /// `quoted_rate` is what the client saw; it must equal the reader's
    /// current rate for `session_type`, which is then snapshotted.
    pub async fn start_session(
        &self,
        client_id: Uuid,
        reader_id: Uuid,
        session_type: SessionType,
        quoted_rate: Decimal,
    ) -> Result<Session, Error> {
        // 1) Reader must exist and be online + approved.
        let reader = match self.stores.readers.get_reader(reader_id).await? {
            Some(r) if r.is_available() => r,
            _ => return Err(Error::ReaderUnavailable),
        };
        if reader.user_id == client_id {
            return Err(Error::Forbidden("Readers cannot book themselves".into()));
        }

        // 2) Re-derive the rate server-side.
        let current = reader.rate_for(session_type);
        if quoted_rate != current {
            return Err(Error::RateChanged { quoted: quoted_rate, current });
        }

        // 3) Floor check.
        let client = self
            .stores
            .users
            .get_user(client_id)
            .await?
            .ok_or(Error::UserNotFound(client_id))?;
        let floor = self.config.balance_floor(current);
        if client.balance < floor {
            return Err(Error::InsufficientBalance {
                required: floor,
                available: client.balance,
            });
        }

        // 4) Persist. The store rejects a second active session for this client.
        let session = Session::start(client_id, reader_id, session_type, current, self.clock.now());
        self.stores.sessions.create_session(&session).await?;

        info!(
            "Session {} started: client={} reader={} type={} rate={}",
            session.session_id, client_id, reader_id, session_type, current
        );

        self.event_bus
            .publish(MarketEvent::SessionStarted {
                session_id: session.session_id,
                client_id,
                reader_id,
                session_type,
                rate_per_minute: current,
                at: session.created_at,
            })
            .await;
        self.channels
            .broadcast(
                session.session_id,
                &RealtimeEvent::SessionStarted { session: session.clone() },
            )
            .await;

        Ok(session)
    }

    /// Ends a session on behalf of one of its participants.
    ///
    /// Ending an already-completed session returns it unchanged and moves no money.
    pub async fn end_session(&self, actor: Uuid, session_id: Uuid) -> Result<Session, Error> {
        let (session, _) = session_for_participant(&self.stores, actor, session_id).await?;
        self.settle(session, EndReason::Participant).await
    }

    /// Computes the final charges and applies them in one atomic store call.
    pub async fn settle(&self, session: Session, reason: EndReason) -> Result<Session, Error> {
        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Completed => return Ok(session),
            _ => return Err(Error::SessionNotActive(session.session_id)),
        }

        let ended_at = self.clock.now();
        let started_at = session.started_at.unwrap_or(session.created_at);
        let charges = SessionCharges::compute(
            session.rate_per_minute,
            started_at,
            ended_at,
            self.config.reader_share,
        );

        let reader = load_reader(&self.stores, session.reader_id)
            .await
            .map_err(|e| self.settlement_failure(&session, e))?;
        let settlement = build_settlement(&session, reader.user_id, ended_at, reason, charges);

        let settled = match self.stores.ledger.settle_session(&settlement).await {
            Ok(Some(done)) => done,
            Ok(None) => {
                // Someone else settled it first; report their result.
                info!("Session {} was already settled; returning stored result", session.session_id);
                return load_session(&self.stores, session.session_id).await;
            }
            Err(e) => return Err(self.settlement_failure(&session, e)),
        };

        info!(
            "Session {} settled ({:?}): {} min, total={} reader={} fee={}",
            settled.session_id,
            reason,
            charges.duration_minutes,
            charges.total_cost,
            charges.reader_earnings,
            charges.platform_fee
        );

        self.channels
            .broadcast(
                settled.session_id,
                &RealtimeEvent::SessionEnded {
                    session: settled.clone(),
                    duration: charges.duration_minutes,
                    total_cost: charges.total_cost,
                    reason,
                },
            )
            .await;
        self.event_bus
            .publish(MarketEvent::SessionEnded {
                session_id: settled.session_id,
                reason,
                duration_minutes: charges.duration_minutes,
                total_cost: charges.total_cost,
                reader_earnings: charges.reader_earnings,
                platform_fee: charges.platform_fee,
                at: ended_at,
            })
            .await;

        Ok(settled)
    }

    fn settlement_failure(&self, session: &Session, e: Error) -> Error {
        error!(
            "Settlement of session {} failed (client={}, reader={}): {:?}",
            session.session_id, session.client_id, session.reader_id, e
        );
        match e {
            Error::SettlementFailure(_) => e,
            other => Error::SettlementFailure(other.to_string()),
        }
    }

    /// Force-ends every active session whose cost at the next sweep would
    /// exceed what the client holds. Returns how many were ended.
    pub async fn sweep_balances(&self) -> Result<usize, Error> {
        let horizon = self.clock.now()
            + chrono::Duration::from_std(self.config.sweep_interval)
                .unwrap_or_else(|_| chrono::Duration::seconds(15));

        let mut ended = 0;
        for session in self.stores.sessions.list_active_sessions().await? {
            let Some(client) = self.stores.users.get_user(session.client_id).await? else {
                warn!("Active session {} has no client row", session.session_id);
                continue;
            };
            let projected_cost = session.projected_cost(horizon);
            if projected_cost <= client.balance {
                continue;
            }

            let session_id = session.session_id;
            match self.settle(session, EndReason::BalanceExhausted).await {
                Ok(done) if done.end_reason == Some(EndReason::BalanceExhausted) => {
                    ended += 1;
                    self.event_bus
                        .publish(MarketEvent::SessionForceEnded {
                            session_id,
                            client_id: client.user_id,
                            projected_cost,
                            balance: client.balance,
                        })
                        .await;
                }
                // Ended by a participant in the meantime.
                Ok(_) => {}
                // Logged inside settle; the next sweep tries again.
                Err(e) => warn!("Sweep could not end session {}: {}", session_id, e),
            }
        }
        Ok(ended)
    }

    pub async fn get_session(&self, actor: Uuid, session_id: Uuid) -> Result<Session, Error> {
        let (session, _) = session_for_participant(&self.stores, actor, session_id).await?;
        Ok(session)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<Session>, Error> {
        self.stores.sessions.list_sessions_for_client(client_id).await
    }

    /// Sessions of the reader profile owned by `actor`.
    pub async fn list_for_reader(&self, actor: Uuid) -> Result<Vec<Session>, Error> {
        let reader = reader_for_user(&self.stores, actor).await?;
        self.stores.sessions.list_sessions_for_reader(reader.reader_id).await
    }

    /// Cost so far if `session` ended now; `None` once it is no longer active.
    pub fn running_cost(&self, session: &Session) -> Option<Decimal> {
        session
            .is_active()
            .then(|| session.projected_cost(self.clock.now()))
    }
}

fn build_settlement(
    session: &Session,
    reader_user_id: Uuid,
    ended_at: DateTime<Utc>,
    reason: EndReason,
    charges: SessionCharges,
) -> Settlement {
    let reference = session.session_id.to_string();
    let mut client_charge = Transaction::new(
        session.client_id,
        TransactionKind::SessionCharge,
        -charges.total_cost,
        &format!("{} reading ({} min)", session.session_type, charges.duration_minutes),
        &reference,
        SESSION_REFERENCE,
    );
    client_charge.created_at = ended_at;

    let mut reader_earning = Transaction::new(
        reader_user_id,
        TransactionKind::SessionEarning,
        charges.reader_earnings,
        &format!("Earnings for {} reading ({} min)", session.session_type, charges.duration_minutes),
        &reference,
        SESSION_REFERENCE,
    );
    reader_earning.created_at = ended_at;

    Settlement {
        session_id: session.session_id,
        client_id: session.client_id,
        reader_id: session.reader_id,
        ended_at,
        end_reason: reason,
        charges,
        client_charge,
        reader_earning,
    }
}
