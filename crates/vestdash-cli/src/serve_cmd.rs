//! `vestdash serve`: JSON API over one shared session.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use vestdash_core::claim::{ClaimError, ClaimOutcome};
use vestdash_core::model::{SessionView, now_epoch_secs};
use vestdash_core::session::{
    CONNECT_FAILED, LOAD_FAILED, NO_WALLET, NoticeLevel, NoticeReceiver, Session, SessionError,
};
use vestdash_core::store::ClaimRequest;
use vestdash_core::wallet::WalletError;

use crate::config::DisplaySection;
use crate::display;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
    detail: String,
}

impl AppError {
    /// Map a session failure for `operation` (the user-facing message) to
    /// an HTTP status.
    fn from_session(operation: &str, err: SessionError) -> Self {
        let (status, message) = match &err {
            SessionError::NotConnected => (StatusCode::CONFLICT, operation),
            SessionError::NoAccounts => (StatusCode::SERVICE_UNAVAILABLE, CONNECT_FAILED),
            SessionError::Wallet(WalletError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, NO_WALLET)
            }
            SessionError::Wallet(_) => (StatusCode::FORBIDDEN, operation),
            SessionError::Reconcile(_) => (StatusCode::BAD_GATEWAY, LOAD_FAILED),
            SessionError::Claim(claim) => (claim_status(claim), operation),
        };
        Self {
            status,
            message: message.to_string(),
            detail: err.to_string(),
        }
    }
}

fn claim_status(err: &ClaimError) -> StatusCode {
    match err {
        ClaimError::NotConnected | ClaimError::InFlight { .. } => StatusCode::CONFLICT,
        ClaimError::UnknownPlan { .. } => StatusCode::NOT_FOUND,
        ClaimError::AccountMismatch { .. } => StatusCode::FORBIDDEN,
        ClaimError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ClaimError::Submission(_) | ClaimError::Confirmation { .. } => StatusCode::BAD_GATEWAY,
        ClaimError::Transition(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message, "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub account: String,
    pub view: SessionView,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub operation_id: String,
    pub tx: String,
    pub request: ClaimRequest,
    /// Set when the claim confirmed but the reload afterwards failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_error: Option<String>,
    pub view: SessionView,
}

impl ClaimResponse {
    fn new(outcome: ClaimOutcome, view: SessionView) -> Self {
        Self {
            operation_id: outcome.receipt.operation_id.to_string(),
            tx: outcome.receipt.handle.to_string(),
            request: outcome.receipt.request,
            reload_error: outcome.reconcile.err().map(|e| e.to_string()),
            view,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ServeState {
    pub session: Arc<Session>,
    pub display: DisplaySection,
}

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/view", get(get_view))
        .route("/api/connect", post(connect))
        .route("/api/refresh", post(refresh))
        .route("/api/claim/{index}", post(claim_one))
        .route("/api/claim-all", post(claim_all))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(
    state: ServeState,
    notices: NoticeReceiver,
    bind: &str,
    port: u16,
) -> Result<()> {
    tokio::spawn(log_notices(notices));

    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("vestdash serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("vestdash serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl+C");
    }
}

/// There is no toast surface over HTTP; notices go to the log.
async fn log_notices(mut notices: NoticeReceiver) {
    while let Some(notice) = notices.recv().await {
        match notice.level {
            NoticeLevel::Error => {
                tracing::warn!(detail = ?notice.detail, "{}", notice.message)
            }
            _ => tracing::info!("{}", notice.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<ServeState>) -> Html<String> {
    let view = state.session.view();
    let summary = display::render_view(&view, &state.display, now_epoch_secs());
    Html(format!(
        "<!DOCTYPE html>\
<html><head><title>vestdash</title></head><body>\
<h1>Token Release Dashboard</h1>\
<p><a href=\"/api/view\">/api/view</a></p>\
<pre>{summary}</pre>\
</body></html>"
    ))
}

async fn get_view(State(state): State<ServeState>) -> Json<SessionView> {
    Json(state.session.view().as_ref().clone())
}

async fn connect(State(state): State<ServeState>) -> Result<Json<ConnectResponse>, AppError> {
    let account = state
        .session
        .connect()
        .await
        .map_err(|e| AppError::from_session(CONNECT_FAILED, e))?;
    Ok(Json(ConnectResponse {
        account: account.to_string(),
        view: state.session.view().as_ref().clone(),
    }))
}

async fn refresh(State(state): State<ServeState>) -> Result<Json<SessionView>, AppError> {
    state
        .session
        .refresh()
        .await
        .map_err(|e| AppError::from_session(LOAD_FAILED, e))?;
    Ok(Json(state.session.view().as_ref().clone()))
}

async fn claim_one(
    State(state): State<ServeState>,
    Path(index): Path<u64>,
) -> Result<Json<ClaimResponse>, AppError> {
    let request = ClaimRequest::Index(index);
    let outcome = state
        .session
        .claim_one(index)
        .await
        .map_err(|e| AppError::from_session(request.failure_message(), e))?;
    let view = state.session.view().as_ref().clone();
    Ok(Json(ClaimResponse::new(outcome, view)))
}

async fn claim_all(State(state): State<ServeState>) -> Result<Json<ClaimResponse>, AppError> {
    let request = ClaimRequest::All;
    let outcome = state
        .session
        .claim_all()
        .await
        .map_err(|e| AppError::from_session(request.failure_message(), e))?;
    let view = state.session.view().as_ref().clone();
    Ok(Json(ClaimResponse::new(outcome, view)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
