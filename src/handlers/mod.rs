pub mod bookings;
pub mod catalog;
pub mod health;
pub mod staff;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use axum::Router;
use chrono::NaiveDate;

use crate::db::queries::DATE_FORMAT;
use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/bookings",
            get(bookings::get_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/bulk-accept", post(bookings::bulk_accept))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/accept", post(bookings::accept_booking))
        .route("/api/bookings/:id/reject", post(bookings::reject_booking))
        .route(
            "/api/staff",
            get(staff::list_staff).post(staff::create_staff),
        )
        .route("/api/staff/:id", patch(staff::update_staff))
        .route(
            "/api/staff/:id/schedule/:date",
            get(staff::get_schedule).put(staff::put_schedule),
        )
        .route("/api/clients", post(catalog::create_client))
        .route("/api/clients/:id", get(catalog::get_client))
        .route(
            "/api/services",
            get(catalog::list_services).post(catalog::create_service),
        )
        .with_state(state)
}

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| AppError::BadRequest(format!("invalid date: {s}")))
}
