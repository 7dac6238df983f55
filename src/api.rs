//! The JSON boundary over the engine. Handlers stay thin: parse, call the
//! engine, map the typed result. All admission/cancellation rejections are
//! expected outcomes and render directly as user-facing messages.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use crate::auth::AdminSecret;
use crate::directory::{Directory, DirectoryError};
use crate::engine::{CancelOutcome, Candidate, Engine, EngineError};
use crate::model::{CourtId, HouseId, Reservation, ReservationStatus, format_hhmm, parse_hhmm};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub directory: Arc<Directory>,
    pub admin: Arc<AdminSecret>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/courts", get(list_courts))
        .route("/api/houses", get(list_houses))
        .route("/api/slots", get(slot_board))
        .route("/api/bookings", post(create_booking).get(lookup_bookings))
        .route("/api/bookings/preflight", post(preflight))
        .route("/api/cancellations", post(cancel_booking))
        .route("/api/admin/bookings", get(admin_list))
        .route("/api/admin/bookings/{id}", delete(admin_delete))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Error mapping ────────────────────────────────────────────────

pub enum ApiError {
    Engine(EngineError),
    Directory(DirectoryError),
    InvalidStartTime(String),
    MissingEmail,
    Unauthorized,
    UnknownId(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        ApiError::Directory(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Engine(e) => {
                let (status, code) = match e {
                    EngineError::OutOfWindow { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "out_of_window"),
                    EngineError::HouseCapExceeded { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "house_cap_exceeded")
                    }
                    EngineError::SlotTaken(_) => (StatusCode::CONFLICT, "slot_taken"),
                    EngineError::InvalidToken => (StatusCode::NOT_FOUND, "invalid_token"),
                    EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    EngineError::UnknownCourt(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_court"),
                    EngineError::UnknownHouse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_house"),
                    EngineError::OffGrid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "off_grid_start"),
                    EngineError::InvalidInput(_) | EngineError::LimitExceeded(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input")
                    }
                    EngineError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
                };
                (status, code, e.to_string())
            }
            ApiError::Directory(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "reference_data_unavailable",
                e.to_string(),
            ),
            ApiError::InvalidStartTime(raw) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_start_time",
                format!("start_time {raw:?} is not HH:MM"),
            ),
            ApiError::MissingEmail => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_input",
                "email query parameter is required".into(),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or wrong admin secret".into(),
            ),
            ApiError::UnknownId(raw) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("no reservation with id {raw:?}"),
            ),
        };
        let body = serde_json::json!({ "error": code, "message": message });
        (status, Json(body)).into_response()
    }
}

// ── Views ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: String,
    pub court_id: CourtId,
    pub house_id: HouseId,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: ReservationStatus,
    pub booker_name: String,
    pub booker_email: Option<String>,
    pub booker_phone: Option<String>,
    pub cancellation_token: String,
    pub created_at_ms: i64,
}

impl From<Reservation> for ReservationView {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            court_id: r.court,
            house_id: r.house,
            booking_date: r.date,
            start_time: format_hhmm(r.range.start),
            end_time: format_hhmm(r.range.end),
            status: r.status,
            booker_name: r.booker_name,
            booker_email: r.booker_email,
            booker_phone: r.booker_phone,
            cancellation_token: r.cancel_token.as_str().to_owned(),
            created_at_ms: r.created_at_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct SlotView {
    start_time: String,
    end_time: String,
    taken: bool,
    taken_by: Option<String>,
}

// ── Reference data ───────────────────────────────────────────────

async fn list_courts(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.directory.refresh()?;
    let snapshot = state.directory.snapshot()?;
    let active: Vec<_> = snapshot.courts.into_iter().filter(|c| c.active).collect();
    Ok(Json(active).into_response())
}

async fn list_houses(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.directory.refresh()?;
    let snapshot = state.directory.snapshot()?;
    let active: Vec<_> = snapshot.houses.into_iter().filter(|h| h.active).collect();
    Ok(Json(active).into_response())
}

// ── Availability ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SlotsQuery {
    court_id: CourtId,
    date: NaiveDate,
}

async fn slot_board(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<SlotView>>, ApiError> {
    let snapshot = state.directory.snapshot()?;
    if snapshot.active_court(&query.court_id).is_none() {
        return Err(EngineError::UnknownCourt(query.court_id).into());
    }
    let board = state.engine.slot_board(&query.court_id, query.date).await;
    let views = board
        .into_iter()
        .map(|cell| SlotView {
            start_time: format_hhmm(cell.start),
            end_time: format_hhmm(cell.end),
            taken: cell.is_taken(),
            taken_by: cell.taken_by.map(|h| snapshot.house_name(&h)),
        })
        .collect();
    Ok(Json(views))
}

// ── Booking ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    house_id: HouseId,
    court_id: CourtId,
    booking_date: NaiveDate,
    start_time: String,
    booker_name: String,
    #[serde(default)]
    booker_email: Option<String>,
    #[serde(default)]
    booker_phone: Option<String>,
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ReservationView>), ApiError> {
    let start = parse_hhmm(&req.start_time)
        .ok_or_else(|| ApiError::InvalidStartTime(req.start_time.clone()))?;
    let candidate = Candidate {
        house: req.house_id,
        court: req.court_id,
        date: req.booking_date,
        start,
        booker_name: req.booker_name.trim().to_owned(),
        booker_email: normalize(req.booker_email),
        booker_phone: normalize(req.booker_phone),
    };
    let reservation = state.engine.admit(candidate).await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

#[derive(Debug, Deserialize)]
struct PreflightRequest {
    house_id: HouseId,
    court_id: CourtId,
    booking_date: NaiveDate,
}

async fn preflight(
    State(state): State<AppState>,
    Json(req): Json<PreflightRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .engine
        .preflight(&req.house_id, &req.court_id, req.booking_date)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
struct LookupQuery {
    email: String,
}

async fn lookup_bookings(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Vec<ReservationView>>, ApiError> {
    let email = query.email.trim();
    if email.is_empty() {
        return Err(ApiError::MissingEmail);
    }
    let rows = state.engine.lookup_by_email(email).await;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ── Cancellation ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CancelRequest {
    token: String,
}

async fn cancel_booking(
    State(state): State<AppState>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.engine.cancel_by_token(req.token.trim()).await?;
    let status = match outcome {
        CancelOutcome::Cancelled => "cancelled",
        CancelOutcome::AlreadyCancelled => "already_cancelled",
    };
    Ok(Json(serde_json::json!({ "status": status })))
}

// ── Admin ────────────────────────────────────────────────────────

fn require_admin(headers: &HeaderMap, admin: &AdminSecret) -> Result<(), ApiError> {
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    if !admin.verify(presented) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

async fn admin_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReservationView>>, ApiError> {
    require_admin(&headers, &state.admin)?;
    let rows = state.engine.list_all().await;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

async fn admin_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&headers, &state.admin)?;
    let id = Ulid::from_string(&id).map_err(|_| ApiError::UnknownId(id.clone()))?;
    state.engine.delete_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
