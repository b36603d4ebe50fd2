//! Moving bookings from `scheduled` to `confirmed`, and rejecting them.
//!
//! Accept operations take the open [`Transaction`] as their unit of work and
//! only write through it; committing is left to the caller so the read phase
//! and the single confirming write stay inside one `IMMEDIATE` transaction.

use std::collections::BTreeMap;

use rusqlite::{Connection, Transaction};
use serde::Serialize;

use crate::db::queries::{self, TIMESTAMP_FORMAT};
use crate::models::{Booking, BookingStatus, Staff};
use crate::services::validator::{self, ConflictReport, Verdict};

#[derive(Debug, Clone)]
pub struct AcceptRequest {
    pub booking_id: String,
    pub staff_id: Option<String>,
}

#[derive(Debug)]
pub enum AcceptOutcome {
    Confirmed(Booking),
    Rejected(ConflictReport),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkSuccess {
    pub booking_id: String,
    pub staff_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkFailure {
    pub booking_id: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkAcceptResult {
    pub success: Vec<BulkSuccess>,
    pub failed: Vec<BulkFailure>,
}

impl BulkAcceptResult {
    /// The transaction should be committed only when something was confirmed.
    pub fn should_commit(&self) -> bool {
        !self.success.is_empty()
    }
}

pub fn accept_booking(tx: &Transaction<'_>, request: &AcceptRequest) -> anyhow::Result<AcceptOutcome> {
    let verdict = validator::validate(tx, &request.booking_id, request.staff_id.as_deref())?;
    apply_verdict(tx, &request.booking_id, verdict)
}

/// Writes an accepting verdict through `tx`. A storage failure here, including
/// the overlap guard in the schema, is an error and never a rejection.
pub fn apply_verdict(
    tx: &Transaction<'_>,
    booking_id: &str,
    verdict: Verdict,
) -> anyhow::Result<AcceptOutcome> {
    match verdict {
        Verdict::Accept { booking, staff } => {
            let confirmed = confirm(tx, booking, &staff)?;
            tracing::info!(
                booking_id = %confirmed.id,
                staff_id = %staff.id,
                "booking confirmed"
            );
            Ok(AcceptOutcome::Confirmed(confirmed))
        }
        Verdict::Reject(report) => {
            tracing::warn!(
                booking_id = %booking_id,
                violations = report.violations().len(),
                "booking acceptance rejected"
            );
            Ok(AcceptOutcome::Rejected(report))
        }
    }
}

/// Accepts each `booking_id -> staff_id` entry independently, in booking id order.
///
/// A confirmed entry is written to `tx` before the next entry is validated, so
/// later entries see earlier assignments from the same batch.
pub fn accept_bulk(
    tx: &Transaction<'_>,
    assignments: &BTreeMap<String, String>,
) -> anyhow::Result<BulkAcceptResult> {
    let mut result = BulkAcceptResult::default();

    for (booking_id, staff_id) in assignments {
        let request = AcceptRequest {
            booking_id: booking_id.clone(),
            staff_id: Some(staff_id.clone()),
        };
        match accept_booking(tx, &request)? {
            AcceptOutcome::Confirmed(booking) => result.success.push(BulkSuccess {
                booking_id: booking.id,
                staff_name: booking.staff_name.unwrap_or_default(),
            }),
            AcceptOutcome::Rejected(report) => result.failed.push(BulkFailure {
                booking_id: booking_id.clone(),
                error: report.to_string(),
            }),
        }
    }

    tracing::info!(
        accepted = result.success.len(),
        failed = result.failed.len(),
        "bulk acceptance evaluated"
    );
    Ok(result)
}

/// Cancels a booking, recording `reason` in its notes. `None` if it does not exist.
pub fn reject_booking(
    conn: &Connection,
    booking_id: &str,
    reason: &str,
) -> anyhow::Result<Option<Booking>> {
    let Some(mut booking) = queries::get_booking_by_id(conn, booking_id)? else {
        return Ok(None);
    };

    let now = queries::now_timestamp();
    let reason = reason.trim();
    let line = if reason.is_empty() {
        format!("[{}] Rejected", now.format(TIMESTAMP_FORMAT))
    } else {
        format!("[{}] Rejected: {reason}", now.format(TIMESTAMP_FORMAT))
    };

    booking.status = BookingStatus::Cancelled;
    booking.append_note(&line);
    booking.updated_at = now;
    queries::update_booking_workflow(conn, &booking)?;

    tracing::info!(booking_id = %booking.id, "booking rejected");
    Ok(Some(booking))
}

fn confirm(conn: &Connection, mut booking: Booking, staff: &Staff) -> anyhow::Result<Booking> {
    let now = queries::now_timestamp();
    booking.status = BookingStatus::Confirmed;
    booking.staff_id = Some(staff.id.clone());
    booking.staff_name = Some(staff.name.clone());
    booking.append_note(&format!(
        "[{}] Accepted and assigned to {}",
        now.format(TIMESTAMP_FORMAT),
        staff.name
    ));
    booking.updated_at = now;
    queries::update_booking_workflow(conn, &booking)?;
    Ok(booking)
}
