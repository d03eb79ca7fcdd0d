//! Axum REST API handlers.
//!
//! | Route                          | Session | Purpose                               |
//! |--------------------------------|---------|---------------------------------------|
//! | `GET  /health`                 | no      | liveness                              |
//! | `POST /pin/verify`             | no      | raw PIN verification transport        |
//! | `GET  /sessions/:id`           | no      | resume session or present challenge   |
//! | `POST /sessions/:id/pin`       | no      | PIN entry (text, keypad, delete)      |
//! | `GET  /installments`           | yes     | schedule with legality flags, summary |
//! | `POST /installments/:id/paid`  | yes     | pay / unpay one installment           |
//!
//! Routes marked *session* require an `x-session-id` header naming an
//! authenticated session.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use loan_protocol::{
    sequencer, toggle_installment, AuthError, Authenticator, ChallengeSnapshot, EntryOutcome, InstallmentStore,
    InstallmentView, LoanError, LoanSummary, LoanTerms, PinVerifier, SessionStart, ToggleOutcome,
    Verdict,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::errors::TrackerError;
use crate::session::SessionRegistry;
use crate::verifier::{VerifyRequest, VerifyResponse};

pub const SESSION_HEADER: &str = "x-session-id";

pub struct ApiState {
    pub store: Arc<dyn InstallmentStore>,
    pub sessions: SessionRegistry,
    pub verifier: Arc<dyn PinVerifier>,
    pub loan_terms: LoanTerms,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pin/verify", post(verify_pin))
        .route("/sessions/:id", get(begin_session))
        .route("/sessions/:id/pin", post(enter_pin))
        .route("/installments", get(list_installments))
        .route("/installments/:id/paid", post(set_paid))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub start: SessionStart,
    pub challenge: ChallengeSnapshot,
}

/// One PIN input event, mirroring the text field and the keypad.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PinInput {
    Enter { input: String },
    Press { digit: char },
    Delete,
}

#[derive(Serialize)]
pub struct PinResponse {
    #[serde(flatten)]
    pub outcome: EntryOutcome,
    pub challenge: ChallengeSnapshot,
}

#[derive(Serialize, Deserialize)]
pub struct InstallmentsResponse {
    pub installments: Vec<InstallmentView>,
    pub summary: LoanSummary,
}

#[derive(Deserialize)]
pub struct SetPaidRequest {
    pub paid: bool,
}

// ─────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────

impl TrackerError {
    fn status(&self) -> StatusCode {
        match self {
            TrackerError::Unauthorized => StatusCode::UNAUTHORIZED,
            TrackerError::InvalidSession => StatusCode::BAD_REQUEST,
            TrackerError::InvalidBody { status, .. } => *status,
            TrackerError::SessionCapacity => StatusCode::SERVICE_UNAVAILABLE,
            TrackerError::Auth(AuthError::SubmissionInFlight) => StatusCode::CONFLICT,
            TrackerError::Auth(AuthError::MalformedCode { .. }) => StatusCode::BAD_REQUEST,
            TrackerError::Loan(LoanError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            TrackerError::Loan(LoanError::StaleSnapshot(_)) => StatusCode::CONFLICT,
            TrackerError::Loan(LoanError::UnknownInstallment(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for TrackerError {
    fn from(rejection: JsonRejection) -> Self {
        TrackerError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        error_response(status, self)
    }
}

fn session_id(headers: &HeaderMap) -> Result<&str, TrackerError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(TrackerError::Unauthorized)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /pin/verify`
///
/// Stateless verification round-trip: `{"pin"}` → `{"success"}`.
pub async fn verify_pin(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Response, TrackerError> {
    let Json(req) = body?;
    Ok(match state.verifier.verify(&req.pin).await {
        Ok(success) => Json(VerifyResponse { success }).into_response(),
        Err(e) => {
            warn!("{e}");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e)
        }
    })
}

/// `GET /sessions/:id`
///
/// Resumes an authenticated session without verification, otherwise
/// reports the challenge state.  Only reads; a session seen for the first
/// time is not cached.
pub async fn begin_session(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, TrackerError> {
    let auth = state.sessions.lookup(&session_id)?;
    let start = auth.begin_session().await?;
    Ok(Json(SessionResponse {
        start,
        challenge: auth.snapshot(),
    }))
}

/// `POST /sessions/:id/pin`
///
/// Feeds one input event to the session's challenge.  The candidate is
/// submitted automatically once it holds six digits.
pub async fn enter_pin(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    body: Result<Json<PinInput>, JsonRejection>,
) -> Result<Response, TrackerError> {
    let Json(input) = body?;
    let auth = state.sessions.authenticator(&session_id)?;

    let outcome = apply_pin_input(&auth, input).await;
    state.sessions.release(&session_id, &auth);
    let outcome = outcome?;

    let status = match outcome {
        EntryOutcome::Busy => StatusCode::CONFLICT,
        EntryOutcome::Submitted {
            verdict: Verdict::Unavailable,
        } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    Ok((
        status,
        Json(PinResponse {
            outcome,
            challenge: auth.snapshot(),
        }),
    )
        .into_response())
}

async fn apply_pin_input(
    auth: &Authenticator,
    input: PinInput,
) -> Result<EntryOutcome, TrackerError> {
    // An evicted entry comes back unauthenticated until the marker is read.
    auth.begin_session().await?;
    Ok(match input {
        PinInput::Enter { input } => auth.enter(&input).await?,
        PinInput::Press { digit } => auth.press_digit(digit).await?,
        PinInput::Delete => auth.delete_last(),
    })
}

/// `GET /installments`
///
/// The full schedule with per-installment legality flags.  Any store
/// failure here is fatal to the page: no partial list is returned.
pub async fn list_installments(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, TrackerError> {
    state
        .sessions
        .require_authenticated(session_id(&headers)?)
        .await?;

    let installments = match state.store.list().await {
        Ok(list) => list,
        Err(e) => return Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
    };
    if let Err(e) = sequencer::validate_sequence(&installments) {
        error!("{e}");
        return Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, e));
    }

    let today = Local::now().date_naive();
    Ok(Json(InstallmentsResponse {
        summary: LoanSummary::compute(&state.loan_terms, &installments),
        installments: sequencer::derive_views(&installments, today),
    })
    .into_response())
}

/// `POST /installments/:id/paid`
///
/// Re-checks the transition against the current schedule before writing.
/// Out-of-order and no-op requests come back as `422` with the reason.
pub async fn set_paid(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<SetPaidRequest>, JsonRejection>,
) -> Result<Response, TrackerError> {
    let Json(req) = body?;
    state
        .sessions
        .require_authenticated(session_id(&headers)?)
        .await?;

    let outcome = toggle_installment(state.store.as_ref(), &id, req.paid).await?;
    let status = match outcome {
        ToggleOutcome::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ToggleOutcome::Applied { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)).into_response())
}
