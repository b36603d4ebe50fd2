use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::errors::AppError;
use crate::models::time_range::format_time;
use crate::models::Booking;
use crate::services::acceptance::{self, AcceptOutcome, AcceptRequest, BulkAcceptResult};
use crate::services::intake::{self, IntakeError, NewBooking};
use crate::services::validator::{ConflictReport, Violation};
use crate::state::AppState;

use super::{check_auth, parse_date};

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    client_id: Option<String>,
    client_name: String,
    client_phone: Option<String>,
    client_email: Option<String>,
    staff_id: Option<String>,
    staff_name: Option<String>,
    service_id: Option<String>,
    service_name: Option<String>,
    duration_minutes: i32,
    price: f64,
    appointment_date: String,
    start_time: String,
    end_time: String,
    status: String,
    payment_status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            client_id: b.client_id,
            client_name: b.client_name,
            client_phone: b.client_phone,
            client_email: b.client_email,
            staff_id: b.staff_id,
            staff_name: b.staff_name,
            service_id: b.service_id,
            service_name: b.service_name,
            duration_minutes: b.duration_minutes,
            price: b.price,
            appointment_date: b.appointment_date.format(DATE_FORMAT).to_string(),
            start_time: format_time(&b.time.start),
            end_time: format_time(&b.time.end),
            status: b.status.as_str().to_string(),
            payment_status: b.payment_status.as_str().to_string(),
            notes: b.notes,
            created_at: b.created_at.format(TIMESTAMP_FORMAT).to_string(),
            updated_at: b.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Serialize)]
struct ViolationResponse {
    category: &'static str,
    message: String,
}

fn rejection_response(report: &ConflictReport) -> Response {
    let status = match report.violations() {
        [Violation::BookingNotFound { .. }] => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let violations: Vec<ViolationResponse> = report
        .violations()
        .iter()
        .map(|v| ViolationResponse {
            category: v.category().label(),
            message: v.to_string(),
        })
        .collect();

    (
        status,
        Json(serde_json::json!({
            "ok": false,
            "error": report.to_string(),
            "violations": violations,
        })),
    )
        .into_response()
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = {
        let db = state.conn()?;
        intake::create_booking(&db, body).map_err(|e| match e {
            IntakeError::Invalid(msg) => AppError::BadRequest(msg),
            IntakeError::Storage(e) => AppError::Internal(e),
        })?
    };

    Ok((StatusCode::CREATED, Json(booking.into())))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let max = state.config.booking_list_limit.max(1);
    let limit = query.limit.unwrap_or(max).clamp(1, max);
    let date = query.date.as_deref().map(parse_date).transpose()?;

    let bookings = {
        let db = state.conn()?;
        queries::list_bookings(&db, date, query.status.as_deref(), limit)?
    };

    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.conn()?;
        queries::get_booking_by_id(&db, &id)?
    };

    booking
        .map(|b| Json(b.into()))
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// POST /api/bookings/:id/accept
#[derive(Deserialize, Default)]
pub struct AcceptBody {
    pub staff_id: Option<String>,
}

pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<AcceptBody>>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let body = body.map(|Json(b)| b).unwrap_or_default();
    let request = AcceptRequest {
        booking_id: id,
        staff_id: body.staff_id,
    };

    let outcome = {
        let mut db = state.conn()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = acceptance::accept_booking(&tx, &request)?;
        if let AcceptOutcome::Confirmed(_) = &outcome {
            tx.commit()?;
        }
        outcome
    };

    Ok(match outcome {
        AcceptOutcome::Confirmed(booking) => Json(serde_json::json!({
            "ok": true,
            "booking": BookingResponse::from(booking),
        }))
        .into_response(),
        AcceptOutcome::Rejected(report) => rejection_response(&report),
    })
}

// POST /api/bookings/bulk-accept
#[derive(Deserialize)]
pub struct BulkAcceptBody {
    pub assignments: BTreeMap<String, String>,
}

pub async fn bulk_accept(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkAcceptBody>,
) -> Result<Json<BulkAcceptResult>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.assignments.is_empty() {
        return Err(AppError::BadRequest("no assignments given".to_string()));
    }

    let result = {
        let mut db = state.conn()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = acceptance::accept_bulk(&tx, &body.assignments)?;
        if result.should_commit() {
            tx.commit()?;
        }
        result
    };

    Ok(Json(result))
}

// POST /api/bookings/:id/reject
#[derive(Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.conn()?;
        acceptance::reject_booking(&db, &id, &body.reason)?
    };

    booking
        .map(|b| Json(b.into()))
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}
