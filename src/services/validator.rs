use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Booking, Staff, StaffSchedule, TimeRange};
use crate::services::client_identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictCategory {
    Booking,
    StaffAssignment,
    StaffAvailability,
    StaffScheduleConflict,
    ClientScheduleConflict,
}

impl ConflictCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictCategory::Booking => "Booking",
            ConflictCategory::StaffAssignment => "Staff Assignment",
            ConflictCategory::StaffAvailability => "Staff Availability",
            ConflictCategory::StaffScheduleConflict => "Staff Schedule Conflict",
            ConflictCategory::ClientScheduleConflict => "Client Schedule Conflict",
        }
    }
}

/// A business rule that blocks a booking from being confirmed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("Booking {booking_id} not found")]
    BookingNotFound { booking_id: String },

    #[error("Booking is {status} and cannot be accepted")]
    InvalidStatus { status: &'static str },

    #[error("A staff member must be assigned before the booking can be accepted")]
    MissingStaffAssignment,

    #[error("Staff member {staff_id} not found")]
    StaffNotFound { staff_id: String },

    #[error("{staff_name} is no longer active and cannot take bookings")]
    StaffInactive { staff_name: String },

    #[error("{}", describe_shift(.staff_name, .date, .booked, .shift))]
    ShiftViolation {
        staff_name: String,
        date: NaiveDate,
        booked: TimeRange,
        /// `None` when no working shift exists for the date.
        shift: Option<TimeRange>,
    },

    #[error("{booked} overlaps {staff_name}'s break ({break_window})")]
    BreakViolation {
        staff_name: String,
        booked: TimeRange,
        break_window: TimeRange,
    },

    #[error("{staff_name} is already booked with {client_name} from {time}")]
    StaffScheduleConflict {
        booking_id: String,
        staff_name: String,
        client_name: String,
        time: TimeRange,
    },

    #[error("Client already has a booking with {staff_name} from {time}")]
    ClientScheduleConflict {
        booking_id: String,
        staff_name: String,
        time: TimeRange,
    },
}

fn describe_shift(
    staff_name: &str,
    date: &NaiveDate,
    booked: &TimeRange,
    shift: &Option<TimeRange>,
) -> String {
    match shift {
        Some(shift) => {
            format!("{booked} is outside {staff_name}'s working hours ({shift}) on {date}")
        }
        None => format!("{staff_name} has no shift scheduled on {date}"),
    }
}

impl Violation {
    pub fn category(&self) -> ConflictCategory {
        match self {
            Violation::BookingNotFound { .. } | Violation::InvalidStatus { .. } => {
                ConflictCategory::Booking
            }
            Violation::MissingStaffAssignment
            | Violation::StaffNotFound { .. }
            | Violation::StaffInactive { .. } => ConflictCategory::StaffAssignment,
            Violation::ShiftViolation { .. } | Violation::BreakViolation { .. } => {
                ConflictCategory::StaffAvailability
            }
            Violation::StaffScheduleConflict { .. } => ConflictCategory::StaffScheduleConflict,
            Violation::ClientScheduleConflict { .. } => ConflictCategory::ClientScheduleConflict,
        }
    }
}

/// Every violation found for one booking, in the order the checks ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    violations: Vec<Violation>,
}

impl ConflictReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self::new(vec![violation])
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_category(&self, category: ConflictCategory) -> bool {
        self.violations.iter().any(|v| v.category() == category)
    }

    /// Violations grouped by category, categories in order of first appearance.
    pub fn grouped(&self) -> Vec<(ConflictCategory, Vec<&Violation>)> {
        let mut groups: Vec<(ConflictCategory, Vec<&Violation>)> = vec![];
        for violation in &self.violations {
            let category = violation.category();
            match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, members)) => members.push(violation),
                None => groups.push((category, vec![violation])),
            }
        }
        groups
    }
}

impl std::fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .grouped()
            .into_iter()
            .map(|(category, members)| match members.as_slice() {
                [only] => format!("{}: {only}", category.label()),
                _ => {
                    let bullets = members
                        .iter()
                        .map(|v| format!("  • {v}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!("{}:\n{bullets}", category.label())
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        f.write_str(&rendered)
    }
}

pub enum Verdict {
    Accept { booking: Booking, staff: Staff },
    Reject(ConflictReport),
}

/// Decides whether `booking_id` may be confirmed with `staff_id` (or its
/// current staff when `None`). Reads only; the caller applies the result.
pub fn validate(
    conn: &Connection,
    booking_id: &str,
    staff_id: Option<&str>,
) -> anyhow::Result<Verdict> {
    let Some(booking) = queries::get_booking_by_id(conn, booking_id)? else {
        return Ok(Verdict::Reject(ConflictReport::single(
            Violation::BookingNotFound {
                booking_id: booking_id.to_string(),
            },
        )));
    };

    if !booking.status.is_acceptable() {
        return Ok(Verdict::Reject(ConflictReport::single(
            Violation::InvalidStatus {
                status: booking.status.as_str(),
            },
        )));
    }

    let staff_id = staff_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(booking.staff_id.as_deref());
    let Some(staff_id) = staff_id else {
        return Ok(Verdict::Reject(ConflictReport::single(
            Violation::MissingStaffAssignment,
        )));
    };

    let Some(staff) = queries::get_staff_by_id(conn, staff_id)? else {
        return Ok(Verdict::Reject(ConflictReport::single(
            Violation::StaffNotFound {
                staff_id: staff_id.to_string(),
            },
        )));
    };

    if !staff.is_active {
        return Ok(Verdict::Reject(ConflictReport::single(
            Violation::StaffInactive {
                staff_name: staff.name,
            },
        )));
    }

    let violations = check_assignment(conn, &booking, &staff)?;
    if violations.is_empty() {
        Ok(Verdict::Accept { booking, staff })
    } else {
        Ok(Verdict::Reject(ConflictReport::new(violations)))
    }
}

/// Runs every availability and overlap check without stopping at the first failure.
pub fn check_assignment(
    conn: &Connection,
    booking: &Booking,
    staff: &Staff,
) -> anyhow::Result<Vec<Violation>> {
    let date = booking.appointment_date;
    let schedule = queries::get_schedule(conn, &staff.id, date)?;
    let staff_bookings = queries::get_active_staff_bookings_on(conn, &staff.id, date, &booking.id)?;
    let same_day = queries::get_assigned_bookings_on(conn, date, &booking.id)?;

    let mut violations = check_shift(booking, staff, schedule.as_ref());
    violations.extend(check_staff_overlap(booking, staff, &staff_bookings));
    violations.extend(check_client_overlap(booking, &same_day));
    Ok(violations)
}

pub fn check_shift(
    booking: &Booking,
    staff: &Staff,
    schedule: Option<&StaffSchedule>,
) -> Vec<Violation> {
    let mut violations = vec![];
    let shift = schedule.and_then(|s| s.working_shift()).copied();

    if !shift.is_some_and(|shift| shift.contains(&booking.time)) {
        violations.push(Violation::ShiftViolation {
            staff_name: staff.name.clone(),
            date: booking.appointment_date,
            booked: booking.time,
            shift,
        });
    }

    // Breaks only apply to working days.
    if let Some(break_window) = shift.and(schedule.and_then(|s| s.break_window)) {
        if booking.time.overlaps(&break_window) {
            violations.push(Violation::BreakViolation {
                staff_name: staff.name.clone(),
                booked: booking.time,
                break_window,
            });
        }
    }

    violations
}

/// `others` must already be restricted to the staff member's active bookings that day.
pub fn check_staff_overlap(booking: &Booking, staff: &Staff, others: &[Booking]) -> Vec<Violation> {
    others
        .iter()
        .filter(|other| other.id != booking.id && booking.time.overlaps(&other.time))
        .map(|other| Violation::StaffScheduleConflict {
            booking_id: other.id.clone(),
            staff_name: staff.name.clone(),
            client_name: other.client_name.clone(),
            time: other.time,
        })
        .collect()
}

/// `others` are the active bookings that day held by any staff member.
pub fn check_client_overlap(booking: &Booking, others: &[Booking]) -> Vec<Violation> {
    let Some(identity) = client_identity::resolve(booking) else {
        return vec![];
    };

    others
        .iter()
        .filter(|other| {
            other.id != booking.id && identity.matches(other) && booking.time.overlaps(&other.time)
        })
        .map(|other| Violation::ClientScheduleConflict {
            booking_id: other.id.clone(),
            staff_name: other
                .staff_name
                .clone()
                .unwrap_or_else(|| "an unassigned staff member".to_string()),
            time: other.time,
        })
        .collect()
}
