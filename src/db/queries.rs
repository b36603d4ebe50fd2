use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::time_range::{format_time, parse_time};
use crate::models::{
    Booking, BookingStatus, Client, PaymentStatus, ScheduleStatus, SpaService, Staff,
    StaffSchedule, TimeRange,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "id, client_id, client_name, client_phone, client_email, staff_id, staff_name, \
     service_id, service_name, duration_minutes, price, appointment_date, start_time, end_time, \
     status, payment_status, notes, created_at, updated_at";

pub fn now_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        ),
        params![
            booking.id,
            booking.client_id,
            booking.client_name,
            booking.client_phone,
            booking.client_email,
            booking.staff_id,
            booking.staff_name,
            booking.service_id,
            booking.service_name,
            booking.duration_minutes,
            booking.price,
            booking.appointment_date.format(DATE_FORMAT).to_string(),
            format_time(&booking.time.start),
            format_time(&booking.time.end),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.notes,
            booking.created_at.format(TIMESTAMP_FORMAT).to_string(),
            booking.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    date: Option<NaiveDate>,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut clauses = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(date) = date {
        params_vec.push(Box::new(date.format(DATE_FORMAT).to_string()));
        clauses.push(format!("appointment_date = ?{}", params_vec.len()));
    }
    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.to_string()));
        clauses.push(format!("status = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    let limit_param = params_vec.len();

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_clause} \
         ORDER BY appointment_date DESC, start_time ASC LIMIT ?{limit_param}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Non-cancelled bookings held by one staff member on one date, excluding `exclude_id`.
pub fn get_active_staff_bookings_on(
    conn: &Connection,
    staff_id: &str,
    date: NaiveDate,
    exclude_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE staff_id = ?1 AND appointment_date = ?2 AND id != ?3 AND status != 'cancelled'
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![staff_id, date.format(DATE_FORMAT).to_string(), exclude_id],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Non-cancelled bookings on one date that already have a staff member, across
/// all staff, excluding `exclude_id`. Unassigned requests hold no slot yet.
pub fn get_assigned_bookings_on(
    conn: &Connection,
    date: NaiveDate,
    exclude_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE appointment_date = ?1 AND id != ?2 AND status != 'cancelled'
           AND staff_id IS NOT NULL
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![date.format(DATE_FORMAT).to_string(), exclude_id],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Persists the mutable workflow fields: status, staff assignment and notes.
pub fn update_booking_workflow(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, staff_id = ?2, staff_name = ?3, notes = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            booking.status.as_str(),
            booking.staff_id,
            booking.staff_name,
            booking.notes,
            booking.updated_at.format(TIMESTAMP_FORMAT).to_string(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let date_str: String = row.get(11)?;
    let start_str: String = row.get(12)?;
    let end_str: String = row.get(13)?;
    let status_str: String = row.get(14)?;
    let payment_str: String = row.get(15)?;
    let created_at_str: String = row.get(17)?;
    let updated_at_str: String = row.get(18)?;

    let appointment_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .with_context(|| format!("booking {id} has invalid date: {date_str}"))?;
    let time = TimeRange::new(parse_time(&start_str)?, parse_time(&end_str)?)
        .with_context(|| format!("booking {id} has invalid time range"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| now_timestamp());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| now_timestamp());

    Ok(Booking {
        id,
        client_id: row.get(1)?,
        client_name: row.get(2)?,
        client_phone: row.get(3)?,
        client_email: row.get(4)?,
        staff_id: row.get(5)?,
        staff_name: row.get(6)?,
        service_id: row.get(7)?,
        service_name: row.get(8)?,
        duration_minutes: row.get(9)?,
        price: row.get(10)?,
        appointment_date,
        time,
        status: BookingStatus::parse(&status_str),
        payment_status: PaymentStatus::parse(&payment_str),
        notes: row.get(16)?,
        created_at,
        updated_at,
    })
}

// ── Staff ──

pub fn create_staff(conn: &Connection, staff: &Staff) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff (id, name, phone, role, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            staff.id,
            staff.name,
            staff.phone,
            staff.role,
            staff.is_active as i32
        ],
    )?;
    Ok(())
}

pub fn get_staff_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Staff>> {
    let staff = conn
        .query_row(
            "SELECT id, name, phone, role, is_active FROM staff WHERE id = ?1",
            params![id],
            parse_staff_row,
        )
        .optional()?;
    Ok(staff)
}

/// Returns false when no staff member has that id.
pub fn set_staff_active(conn: &Connection, id: &str, is_active: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE staff SET is_active = ?1 WHERE id = ?2",
        params![is_active as i32, id],
    )?;
    Ok(count > 0)
}

pub fn list_staff(conn: &Connection) -> anyhow::Result<Vec<Staff>> {
    let mut stmt =
        conn.prepare("SELECT id, name, phone, role, is_active FROM staff ORDER BY name ASC")?;
    let rows = stmt.query_map([], parse_staff_row)?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row?);
    }
    Ok(staff)
}

fn parse_staff_row(row: &rusqlite::Row) -> rusqlite::Result<Staff> {
    Ok(Staff {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        role: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
    })
}

// ── Staff Schedules ──

pub fn save_schedule(conn: &Connection, schedule: &StaffSchedule) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff_schedules (staff_id, work_date, shift_start, shift_end, break_start, break_end, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(staff_id, work_date) DO UPDATE SET
           shift_start = excluded.shift_start,
           shift_end = excluded.shift_end,
           break_start = excluded.break_start,
           break_end = excluded.break_end,
           status = excluded.status,
           updated_at = datetime('now')",
        params![
            schedule.staff_id,
            schedule.work_date.format(DATE_FORMAT).to_string(),
            format_time(&schedule.shift.start),
            format_time(&schedule.shift.end),
            schedule.break_window.map(|b| format_time(&b.start)),
            schedule.break_window.map(|b| format_time(&b.end)),
            schedule.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_schedule(
    conn: &Connection,
    staff_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Option<StaffSchedule>> {
    let row = conn
        .query_row(
            "SELECT shift_start, shift_end, break_start, break_end, status
             FROM staff_schedules WHERE staff_id = ?1 AND work_date = ?2",
            params![staff_id, date.format(DATE_FORMAT).to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((shift_start, shift_end, break_start, break_end, status)) = row else {
        return Ok(None);
    };

    let shift = TimeRange::parse(&shift_start, &shift_end)
        .with_context(|| format!("invalid shift for staff {staff_id} on {date}"))?;
    // A half-defined break is treated as no break at all.
    let break_window = match (break_start, break_end) {
        (Some(start), Some(end)) => Some(
            TimeRange::parse(&start, &end)
                .with_context(|| format!("invalid break for staff {staff_id} on {date}"))?,
        ),
        _ => None,
    };

    Ok(Some(StaffSchedule {
        staff_id: staff_id.to_string(),
        work_date: date,
        shift,
        break_window,
        status: ScheduleStatus::parse(&status),
    }))
}

// ── Clients ──

pub fn create_client(conn: &Connection, client: &Client) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO clients (id, name, phone, email) VALUES (?1, ?2, ?3, ?4)",
        params![client.id, client.name, client.phone, client.email],
    )?;
    Ok(())
}

pub fn get_client_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Client>> {
    let client = conn
        .query_row(
            "SELECT id, name, phone, email FROM clients WHERE id = ?1",
            params![id],
            |row| {
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    email: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(client)
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &SpaService) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, duration_minutes, price) VALUES (?1, ?2, ?3, ?4)",
        params![
            service.id,
            service.name,
            service.duration_minutes,
            service.price
        ],
    )?;
    Ok(())
}

pub fn get_service_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<SpaService>> {
    let service = conn
        .query_row(
            "SELECT id, name, duration_minutes, price FROM services WHERE id = ?1",
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<SpaService>> {
    let mut stmt =
        conn.prepare("SELECT id, name, duration_minutes, price FROM services ORDER BY name ASC")?;
    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<SpaService> {
    Ok(SpaService {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        price: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn staff(conn: &Connection, id: &str) {
        create_staff(
            conn,
            &Staff {
                id: id.to_string(),
                name: format!("Staff {id}"),
                phone: None,
                role: Some("therapist".to_string()),
                is_active: true,
            },
        )
        .unwrap();
    }

    fn booking(id: &str, staff_id: &str, start: &str, end: &str, status: BookingStatus) -> Booking {
        let now = now_timestamp();
        Booking {
            id: id.to_string(),
            client_id: None,
            client_name: "Alice".to_string(),
            client_phone: Some("+15551110000".to_string()),
            client_email: None,
            staff_id: Some(staff_id.to_string()),
            staff_name: Some(format!("Staff {staff_id}")),
            service_id: None,
            service_name: Some("Facial".to_string()),
            duration_minutes: 60,
            price: 80.0,
            appointment_date: date(),
            time: TimeRange::parse(start, end).unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_booking_is_stored_and_loaded() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        create_booking(&conn, &booking("b1", "s1", "10:00", "11:00", BookingStatus::Scheduled))
            .unwrap();

        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.time, TimeRange::parse("10:00", "11:00").unwrap());
        assert_eq!(loaded.appointment_date, date());
        assert_eq!(loaded.status, BookingStatus::Scheduled);
        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_active_staff_bookings_skip_cancelled_and_self() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        create_booking(&conn, &booking("b1", "s1", "10:00", "11:00", BookingStatus::Scheduled))
            .unwrap();
        create_booking(&conn, &booking("b2", "s1", "11:00", "12:00", BookingStatus::Cancelled))
            .unwrap();
        create_booking(&conn, &booking("b3", "s1", "13:00", "14:00", BookingStatus::Confirmed))
            .unwrap();

        let active = get_active_staff_bookings_on(&conn, "s1", date(), "b1").unwrap();
        let ids: Vec<&str> = active.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b3"]);
    }

    #[test]
    fn test_assigned_bookings_skip_unassigned_requests() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        staff(&conn, "s2");
        create_booking(&conn, &booking("b1", "s1", "10:00", "11:00", BookingStatus::Confirmed))
            .unwrap();
        create_booking(&conn, &booking("b2", "s2", "10:15", "11:00", BookingStatus::Scheduled))
            .unwrap();
        let mut pending = booking("b3", "s1", "10:30", "11:30", BookingStatus::Scheduled);
        pending.staff_id = None;
        pending.staff_name = None;
        create_booking(&conn, &pending).unwrap();

        let assigned = get_assigned_bookings_on(&conn, date(), "b0").unwrap();
        let ids: Vec<&str> = assigned.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
    }

    #[test]
    fn test_list_bookings_filters_by_status() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        create_booking(&conn, &booking("b1", "s1", "10:00", "11:00", BookingStatus::Scheduled))
            .unwrap();
        create_booking(&conn, &booking("b2", "s1", "12:00", "13:00", BookingStatus::Cancelled))
            .unwrap();

        assert_eq!(list_bookings(&conn, None, None, 10).unwrap().len(), 2);
        let cancelled = list_bookings(&conn, Some(date()), Some("cancelled"), 10).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, "b2");
    }

    #[test]
    fn test_schedule_upsert_replaces_previous_window() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        let shift = TimeRange::parse("09:00", "18:00").unwrap();
        let lunch = TimeRange::parse("12:00", "13:00").unwrap();
        save_schedule(
            &conn,
            &StaffSchedule::new("s1", date(), shift, Some(lunch), ScheduleStatus::Working).unwrap(),
        )
        .unwrap();

        let later = TimeRange::parse("10:00", "19:00").unwrap();
        save_schedule(
            &conn,
            &StaffSchedule::new("s1", date(), later, None, ScheduleStatus::Working).unwrap(),
        )
        .unwrap();

        let loaded = get_schedule(&conn, "s1", date()).unwrap().unwrap();
        assert_eq!(loaded.shift, later);
        assert!(loaded.break_window.is_none());
    }

    #[test]
    fn test_overlap_trigger_blocks_second_confirmed_booking() {
        let conn = db::init_db(":memory:").unwrap();
        staff(&conn, "s1");
        create_booking(&conn, &booking("b1", "s1", "10:00", "11:00", BookingStatus::Confirmed))
            .unwrap();
        create_booking(&conn, &booking("b2", "s1", "10:30", "11:30", BookingStatus::Scheduled))
            .unwrap();

        let mut second = get_booking_by_id(&conn, "b2").unwrap().unwrap();
        second.status = BookingStatus::Confirmed;
        let err = update_booking_workflow(&conn, &second).unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }
}
