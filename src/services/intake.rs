use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::models::time_range::parse_time;
use crate::models::{Booking, BookingStatus, PaymentStatus, TimeRange};

/// Online booking request as submitted by a client or the front desk.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Stores a new booking in `scheduled` state. No conflict checks happen here;
/// those run when staff accept the booking.
pub fn create_booking(conn: &Connection, request: NewBooking) -> Result<Booking, IntakeError> {
    let (client_id, client_name, client_phone, client_email) = match blank_to_none(request.client_id) {
        Some(id) => {
            let client = queries::get_client_by_id(conn, &id)?
                .ok_or_else(|| IntakeError::Invalid(format!("unknown client: {id}")))?;
            (
                Some(client.id),
                client.name,
                client.phone.or(blank_to_none(request.client_phone)),
                client.email.or(blank_to_none(request.client_email)),
            )
        }
        None => {
            let name = blank_to_none(request.client_name)
                .ok_or_else(|| IntakeError::Invalid("client name is required".to_string()))?;
            (
                None,
                name,
                blank_to_none(request.client_phone),
                blank_to_none(request.client_email),
            )
        }
    };

    let service = match blank_to_none(request.service_id) {
        Some(id) => Some(
            queries::get_service_by_id(conn, &id)?
                .ok_or_else(|| IntakeError::Invalid(format!("unknown service: {id}")))?,
        ),
        None => None,
    };

    let staff = match blank_to_none(request.staff_id) {
        Some(id) => Some(
            queries::get_staff_by_id(conn, &id)?
                .ok_or_else(|| IntakeError::Invalid(format!("unknown staff member: {id}")))?,
        ),
        None => None,
    };

    let start = parse_time(&request.start_time).map_err(|e| IntakeError::Invalid(e.to_string()))?;
    let end = match blank_to_none(request.end_time) {
        Some(end) => parse_time(&end).map_err(|e| IntakeError::Invalid(e.to_string()))?,
        None => {
            let minutes = request
                .duration_minutes
                .or(service.as_ref().map(|s| s.duration_minutes))
                .ok_or_else(|| {
                    IntakeError::Invalid("an end time, duration or service is required".to_string())
                })?;
            let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(minutes as i64));
            if wrapped != 0 {
                return Err(IntakeError::Invalid(
                    "appointment must end on the same day".to_string(),
                ));
            }
            end
        }
    };
    let time = TimeRange::new(start, end).map_err(|e| IntakeError::Invalid(e.to_string()))?;

    let now = queries::now_timestamp();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        client_id,
        client_name,
        client_phone,
        client_email,
        staff_id: staff.as_ref().map(|s| s.id.clone()),
        staff_name: staff.map(|s| s.name),
        service_id: service.as_ref().map(|s| s.id.clone()),
        service_name: service.as_ref().map(|s| s.name.clone()),
        duration_minutes: (time.end - time.start).num_minutes() as i32,
        price: service.map(|s| s.price).unwrap_or(0.0),
        appointment_date: request.appointment_date,
        time,
        status: BookingStatus::Scheduled,
        payment_status: PaymentStatus::Unpaid,
        notes: blank_to_none(request.notes),
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(conn, &booking)?;
    tracing::info!(booking_id = %booking.id, date = %booking.appointment_date, "booking created");
    Ok(booking)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Client, SpaService};

    fn request() -> NewBooking {
        NewBooking {
            client_id: None,
            client_name: Some("Alice".to_string()),
            client_phone: Some("+15551110000".to_string()),
            client_email: None,
            service_id: None,
            staff_id: None,
            appointment_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            start_time: "10:00".to_string(),
            end_time: Some("11:00".to_string()),
            duration_minutes: None,
            notes: None,
        }
    }

    #[test]
    fn test_creates_scheduled_booking() {
        let conn = db::init_db(":memory:").unwrap();
        let booking = create_booking(&conn, request()).unwrap();
        assert_eq!(booking.status, BookingStatus::Scheduled);
        assert_eq!(booking.duration_minutes, 60);

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.client_name, "Alice");
    }

    #[test]
    fn test_end_time_derived_from_service() {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_service(
            &conn,
            &SpaService {
                id: "facial".to_string(),
                name: "Facial".to_string(),
                duration_minutes: 90,
                price: 65.0,
            },
        )
        .unwrap();

        let mut req = request();
        req.end_time = None;
        req.service_id = Some("facial".to_string());
        let booking = create_booking(&conn, req).unwrap();
        assert_eq!(booking.time.to_string(), "10:00-11:30");
        assert_eq!(booking.service_name.as_deref(), Some("Facial"));
        assert_eq!(booking.price, 65.0);
    }

    #[test]
    fn test_client_record_fills_contact_details() {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_client(
            &conn,
            &Client {
                id: "c1".to_string(),
                name: "Ann Lee".to_string(),
                phone: Some("+15552220000".to_string()),
                email: None,
            },
        )
        .unwrap();

        let mut req = request();
        req.client_id = Some("c1".to_string());
        req.client_name = None;
        req.client_phone = None;
        let booking = create_booking(&conn, req).unwrap();
        assert_eq!(booking.client_id.as_deref(), Some("c1"));
        assert_eq!(booking.client_name, "Ann Lee");
        assert_eq!(booking.client_phone.as_deref(), Some("+15552220000"));
    }

    #[test]
    fn test_invalid_requests_are_rejected() {
        let conn = db::init_db(":memory:").unwrap();

        let mut no_name = request();
        no_name.client_name = Some("  ".to_string());
        assert!(matches!(create_booking(&conn, no_name), Err(IntakeError::Invalid(_))));

        let mut inverted = request();
        inverted.end_time = Some("09:00".to_string());
        assert!(matches!(create_booking(&conn, inverted), Err(IntakeError::Invalid(_))));

        let mut past_midnight = request();
        past_midnight.start_time = "23:30".to_string();
        past_midnight.end_time = None;
        past_midnight.duration_minutes = Some(60);
        assert!(matches!(create_booking(&conn, past_midnight), Err(IntakeError::Invalid(_))));

        let mut unknown_service = request();
        unknown_service.service_id = Some("nope".to_string());
        assert!(matches!(create_booking(&conn, unknown_service), Err(IntakeError::Invalid(_))));
    }
}
