//! soulseer-server/src/api/mod.rs
//!
//! The axum router. Every route except `/health` needs a resolved user.

pub mod error;
pub mod routes;
pub mod ws;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::context::ServerContext;
use error::ApiError;

pub type AppState = Arc<ServerContext>;

/// The caller, as resolved by the context's `AuthResolver`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .auth
            .resolve(&parts.headers)
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthorized)
    }
}

pub fn router(ctx: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/me", get(routes::me))
        .route("/api/transactions", get(routes::list_transactions))
        // sessions
        .route("/api/sessions", get(routes::list_client_sessions).post(routes::start_session))
        .route("/api/sessions/{id}", get(routes::get_session))
        .route("/api/sessions/{id}/end", post(routes::end_session))
        .route(
            "/api/sessions/{id}/messages",
            get(routes::list_messages).post(routes::send_message),
        )
        .route("/api/messages/conversations", get(routes::list_conversations))
        .route("/api/messages/read", post(routes::mark_read))
        // readers
        .route("/api/readers", get(routes::list_readers))
        .route("/api/readers/online", get(routes::list_online_readers))
        .route("/api/readers/{id}", get(routes::get_reader))
        .route("/api/readers/{id}/status", put(routes::set_reader_status))
        .route("/api/readers/{id}/rates", put(routes::update_reader_rates))
        .route("/api/readers/{id}/approve", post(routes::approve_reader))
        .route("/api/reader/sessions", get(routes::list_reader_sessions))
        // admin
        .route("/api/admin/users", get(routes::admin_list_users))
        .route(
            "/api/admin/readers",
            get(routes::admin_list_readers).post(routes::admin_create_reader),
        )
        .route("/api/admin/sessions", get(routes::admin_list_sessions))
        // money
        .route("/api/deposits", post(routes::create_deposit))
        .route("/api/deposits/confirm", post(routes::confirm_deposit))
        .route("/api/payouts", post(routes::request_payout))
        .route("/api/payouts/onboarding", post(routes::start_onboarding))
        .route("/api/payouts/onboarding/refresh", post(routes::refresh_onboarding))
        // realtime
        .route("/ws", get(ws::ws_handler))
        .with_state(ctx)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
