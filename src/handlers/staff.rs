use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, DATE_FORMAT};
use crate::errors::AppError;
use crate::models::time_range::format_time;
use crate::models::{ScheduleStatus, Staff, StaffSchedule, TimeRange};
use crate::state::AppState;

use super::{check_auth, parse_date};

// GET /api/staff
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Staff>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = state.conn()?;
        queries::list_staff(&db)?
    };

    Ok(Json(staff))
}

// POST /api/staff
#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub phone: Option<String>,
    pub role: Option<String>,
}

pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("staff name is required".to_string()));
    }

    let staff = Staff {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: body.phone,
        role: body.role,
        is_active: true,
    };

    {
        let db = state.conn()?;
        queries::create_staff(&db, &staff)?;
    }

    tracing::info!(staff_id = %staff.id, "staff member created");
    Ok((StatusCode::CREATED, Json(staff)))
}

// PATCH /api/staff/:id
#[derive(Deserialize)]
pub struct UpdateStaffRequest {
    pub is_active: bool,
}

pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStaffRequest>,
) -> Result<Json<Staff>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = state.conn()?;
        if !queries::set_staff_active(&db, &id, body.is_active)? {
            return Err(AppError::NotFound(format!("staff member {id}")));
        }
        queries::get_staff_by_id(&db, &id)?
    };

    tracing::info!(staff_id = %id, is_active = body.is_active, "staff member updated");
    staff
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("staff member {id}")))
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    staff_id: String,
    work_date: String,
    shift_start: String,
    shift_end: String,
    break_start: Option<String>,
    break_end: Option<String>,
    status: String,
}

impl From<StaffSchedule> for ScheduleResponse {
    fn from(s: StaffSchedule) -> Self {
        Self {
            staff_id: s.staff_id,
            work_date: s.work_date.format(DATE_FORMAT).to_string(),
            shift_start: format_time(&s.shift.start),
            shift_end: format_time(&s.shift.end),
            break_start: s.break_window.map(|b| format_time(&b.start)),
            break_end: s.break_window.map(|b| format_time(&b.end)),
            status: s.status.as_str().to_string(),
        }
    }
}

// PUT /api/staff/:id/schedule/:date
#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub shift_start: String,
    pub shift_end: String,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
    pub status: Option<ScheduleStatus>,
}

pub async fn put_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((staff_id, date)): Path<(String, String)>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = parse_date(&date)?;
    let shift = TimeRange::parse(&body.shift_start, &body.shift_end)
        .map_err(|e| AppError::BadRequest(format!("shift: {e}")))?;
    let break_window = match (body.break_start.as_deref(), body.break_end.as_deref()) {
        (Some(start), Some(end)) => Some(
            TimeRange::parse(start, end)
                .map_err(|e| AppError::BadRequest(format!("break: {e}")))?,
        ),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "break needs both a start and an end".to_string(),
            ))
        }
    };
    let schedule = StaffSchedule::new(
        &staff_id,
        date,
        shift,
        break_window,
        body.status.unwrap_or(ScheduleStatus::Working),
    )
    .map_err(|e| AppError::BadRequest(e.to_string()))?;

    {
        let db = state.conn()?;
        if queries::get_staff_by_id(&db, &staff_id)?.is_none() {
            return Err(AppError::NotFound(format!("staff member {staff_id}")));
        }
        queries::save_schedule(&db, &schedule)?;
    }

    tracing::info!(staff_id = %staff_id, date = %date, "staff schedule saved");
    Ok(Json(schedule.into()))
}

// GET /api/staff/:id/schedule/:date
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((staff_id, date)): Path<(String, String)>,
) -> Result<Json<ScheduleResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = parse_date(&date)?;
    let schedule = {
        let db = state.conn()?;
        queries::get_schedule(&db, &staff_id, date)?
    };

    schedule
        .map(|s| Json(s.into()))
        .ok_or_else(|| AppError::NotFound(format!("schedule for {staff_id} on {date}")))
}
