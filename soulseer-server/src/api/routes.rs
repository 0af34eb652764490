// soulseer-server/src/api/routes.rs

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use soulseer_core::models::{
    Conversation, DepositCheckout, Message, Reader, ReaderRates, Session, SessionType,
    Transaction, User, UserRole,
};
use soulseer_core::services::{DepositService, PayoutService};
use soulseer_core::Error;

use super::error::ApiError;
use super::{AppState, CurrentUser};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub reader_id: Uuid,
    pub session_type: SessionType,
    /// The rate the client was shown; rejected if the reader has changed it since.
    pub rate_per_minute: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub sender_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderStatusRequest {
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDepositRequest {
    pub provider_session_id: String,
}

/// Rates left out fall back to the platform defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReaderRequest {
    pub user_id: Uuid,
    pub display_name: String,
    pub chat_rate: Option<Decimal>,
    pub voice_rate: Option<Decimal>,
    pub video_rate: Option<Decimal>,
}

impl CreateReaderRequest {
    fn rates(&self) -> ReaderRates {
        let defaults = ReaderRates::default();
        ReaderRates {
            chat_rate: self.chat_rate.unwrap_or(defaults.chat_rate),
            voice_rate: self.voice_rate.unwrap_or(defaults.voice_rate),
            video_rate: self.video_rate.unwrap_or(defaults.video_rate),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

/// A session plus what it has cost so far while still running.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub running_cost: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct MeView {
    pub user: User,
    pub reader: Option<Reader>,
}

fn session_view(state: &AppState, session: Session) -> SessionView {
    let running_cost = state.metering.running_cost(&session);
    SessionView { session, running_cost }
}

fn deposits(state: &AppState) -> Result<&Arc<DepositService>, ApiError> {
    state.deposits.as_ref().ok_or_else(ApiError::payments_disabled)
}

fn payouts(state: &AppState) -> Result<&Arc<PayoutService>, ApiError> {
    state.payouts.as_ref().ok_or_else(ApiError::payments_disabled)
}

/// 503 when the configured database stops answering.
pub async fn health(State(state): State<AppState>) -> StatusCode {
    match &state.db {
        Some(db) if db.ping().await.is_err() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

pub async fn me(State(state): State<AppState>, CurrentUser(user_id): CurrentUser) -> ApiResult<MeView> {
    let user = state
        .stores
        .users
        .get_user(user_id)
        .await?
        .ok_or(Error::UserNotFound(user_id))?;
    let reader = state.stores.readers.get_reader_by_user_id(user_id).await?;
    Ok(Json(MeView { user, reader }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<Transaction>> {
    Ok(Json(state.ledger.list_transactions(user_id).await?))
}

// ----------------------------------------------------------------
// Sessions
// ----------------------------------------------------------------

pub async fn start_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<SessionView> {
    let session = state
        .metering
        .start_session(user_id, req.reader_id, req.session_type, req.rate_per_minute)
        .await?;
    Ok(Json(session_view(&state, session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = state.metering.get_session(user_id, session_id).await?;
    Ok(Json(session_view(&state, session)))
}

pub async fn end_session(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = state.metering.end_session(user_id, session_id).await?;
    Ok(Json(session_view(&state, session)))
}

pub async fn list_client_sessions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<SessionView>> {
    let sessions = state.metering.list_for_client(user_id).await?;
    Ok(Json(sessions.into_iter().map(|s| session_view(&state, s)).collect()))
}

pub async fn list_reader_sessions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<SessionView>> {
    let sessions = state.metering.list_for_reader(user_id).await?;
    Ok(Json(sessions.into_iter().map(|s| session_view(&state, s)).collect()))
}

// ----------------------------------------------------------------
// Messages
// ----------------------------------------------------------------

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Message> {
    Ok(Json(state.messages.send_message(session_id, user_id, &req.content).await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Vec<Message>> {
    Ok(Json(state.messages.list_session_messages(user_id, session_id).await?))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<Conversation>> {
    Ok(Json(state.messages.list_conversations(user_id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Value> {
    let updated = state.messages.mark_read(user_id, req.sender_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

// ----------------------------------------------------------------
// Readers
// ----------------------------------------------------------------

pub async fn list_readers(State(state): State<AppState>, _user: CurrentUser) -> ApiResult<Vec<Reader>> {
    Ok(Json(state.readers.list_approved().await?))
}

pub async fn list_online_readers(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Vec<Reader>> {
    Ok(Json(state.readers.list_online().await?))
}

pub async fn get_reader(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(reader_id): Path<Uuid>,
) -> ApiResult<Reader> {
    Ok(Json(state.readers.get(reader_id).await?))
}

pub async fn set_reader_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(reader_id): Path<Uuid>,
    Json(req): Json<ReaderStatusRequest>,
) -> ApiResult<Reader> {
    Ok(Json(state.readers.set_online(user_id, reader_id, req.is_online).await?))
}

pub async fn update_reader_rates(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(reader_id): Path<Uuid>,
    Json(rates): Json<ReaderRates>,
) -> ApiResult<Reader> {
    Ok(Json(state.readers.update_rates(user_id, reader_id, rates).await?))
}

pub async fn approve_reader(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(reader_id): Path<Uuid>,
) -> ApiResult<Reader> {
    Ok(Json(state.readers.approve(user_id, reader_id).await?))
}

// ----------------------------------------------------------------
// Admin
// ----------------------------------------------------------------

pub async fn admin_list_users(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<User>> {
    Ok(Json(state.admin.list_users(user_id, filter.role).await?))
}

pub async fn admin_list_readers(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<Reader>> {
    Ok(Json(state.admin.list_readers(user_id).await?))
}

pub async fn admin_create_reader(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CreateReaderRequest>,
) -> ApiResult<Reader> {
    let rates = req.rates();
    let reader = state
        .readers
        .create_reader(user_id, req.user_id, &req.display_name, rates)
        .await?;
    Ok(Json(reader))
}

pub async fn admin_list_sessions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<SessionView>> {
    let sessions = state.admin.list_sessions(user_id).await?;
    Ok(Json(sessions.into_iter().map(|s| session_view(&state, s)).collect()))
}

// ----------------------------------------------------------------
// Deposits and payouts
// ----------------------------------------------------------------

pub async fn create_deposit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositCheckout> {
    Ok(Json(deposits(&state)?.create_deposit(user_id, req.amount).await?))
}

pub async fn confirm_deposit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<ConfirmDepositRequest>,
) -> ApiResult<Value> {
    let balance = deposits(&state)?
        .confirm_deposit(user_id, &req.provider_session_id)
        .await?;
    Ok(Json(json!({ "balance": balance })))
}

pub async fn start_onboarding(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Value> {
    let url = payouts(&state)?.start_onboarding(user_id).await?;
    Ok(Json(json!({ "url": url })))
}

pub async fn refresh_onboarding(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Reader> {
    Ok(Json(payouts(&state)?.refresh_onboarding(user_id).await?))
}

pub async fn request_payout(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Transaction> {
    Ok(Json(payouts(&state)?.payout(user_id).await?))
}
