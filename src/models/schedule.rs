use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TimeRange;

/// One staff member's working window for one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSchedule {
    pub staff_id: String,
    pub work_date: NaiveDate,
    pub shift: TimeRange,
    pub break_window: Option<TimeRange>,
    pub status: ScheduleStatus,
}

impl StaffSchedule {
    pub fn new(
        staff_id: &str,
        work_date: NaiveDate,
        shift: TimeRange,
        break_window: Option<TimeRange>,
        status: ScheduleStatus,
    ) -> anyhow::Result<Self> {
        if let Some(brk) = &break_window {
            if !shift.contains(brk) {
                return Err(anyhow::anyhow!(
                    "break {brk} must fall within shift {shift}"
                ));
            }
        }
        Ok(Self {
            staff_id: staff_id.to_string(),
            work_date,
            shift,
            break_window,
            status,
        })
    }

    /// The shift only counts when the staff member is actually working that day.
    pub fn working_shift(&self) -> Option<&TimeRange> {
        match self.status {
            ScheduleStatus::Working => Some(&self.shift),
            ScheduleStatus::DayOff | ScheduleStatus::Leave => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Working,
    DayOff,
    Leave,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Working => "working",
            ScheduleStatus::DayOff => "day_off",
            ScheduleStatus::Leave => "leave",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "day_off" => ScheduleStatus::DayOff,
            "leave" => ScheduleStatus::Leave,
            _ => ScheduleStatus::Working,
        }
    }
}
