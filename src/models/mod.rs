pub mod booking;
pub mod client;
pub mod schedule;
pub mod service;
pub mod staff;
pub mod time_range;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use client::Client;
pub use schedule::{ScheduleStatus, StaffSchedule};
pub use service::SpaService;
pub use staff::Staff;
pub use time_range::TimeRange;
