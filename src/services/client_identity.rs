//! Deciding whether two bookings belong to the same client.
//!
//! The candidate's identity is taken from the first strategy in [`STRATEGIES`]
//! for which it carries a key, and only that key is compared against other
//! bookings. The order is part of the contract: reordering changes which
//! bookings count as a client double-booking.

use crate::models::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    ById,
    ByPhone,
    ByName,
}

pub const STRATEGIES: [MatchStrategy; 3] = [
    MatchStrategy::ById,
    MatchStrategy::ByPhone,
    MatchStrategy::ByName,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    Id(String),
    Phone(String),
    /// Stored lowercased.
    Name(String),
}

impl MatchStrategy {
    pub fn key_of(&self, booking: &Booking) -> Option<ClientIdentity> {
        match self {
            MatchStrategy::ById => {
                non_blank(booking.client_id.as_deref()).map(|id| ClientIdentity::Id(id.to_string()))
            }
            MatchStrategy::ByPhone => non_blank(booking.client_phone.as_deref())
                .map(|phone| ClientIdentity::Phone(phone.to_string())),
            MatchStrategy::ByName => non_blank(Some(booking.client_name.as_str()))
                .map(|name| ClientIdentity::Name(name.to_lowercase())),
        }
    }
}

/// First available identity key for `booking`, in strategy priority order.
pub fn resolve(booking: &Booking) -> Option<ClientIdentity> {
    STRATEGIES.iter().find_map(|strategy| strategy.key_of(booking))
}

impl ClientIdentity {
    pub fn matches(&self, other: &Booking) -> bool {
        match self {
            ClientIdentity::Id(id) => non_blank(other.client_id.as_deref()) == Some(id.as_str()),
            ClientIdentity::Phone(phone) => {
                non_blank(other.client_phone.as_deref()) == Some(phone.as_str())
            }
            // Case-insensitive substring, no further normalisation.
            ClientIdentity::Name(name) => other.client_name.to_lowercase().contains(name.as_str()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PaymentStatus, TimeRange};
    use chrono::{NaiveDate, Utc};

    fn booking(client_id: Option<&str>, phone: Option<&str>, name: &str) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: "b".to_string(),
            client_id: client_id.map(str::to_string),
            client_name: name.to_string(),
            client_phone: phone.map(str::to_string),
            client_email: None,
            staff_id: None,
            staff_name: None,
            service_id: None,
            service_name: None,
            duration_minutes: 60,
            price: 0.0,
            appointment_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            time: TimeRange::parse("10:00", "11:00").unwrap(),
            status: BookingStatus::Scheduled,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_id_takes_priority_over_phone_and_name() {
        let b = booking(Some("c1"), Some("+1555"), "Alice");
        assert_eq!(resolve(&b), Some(ClientIdentity::Id("c1".to_string())));
    }

    #[test]
    fn test_phone_used_when_no_id() {
        let b = booking(None, Some(" +1555 "), "Alice");
        assert_eq!(resolve(&b), Some(ClientIdentity::Phone("+1555".to_string())));
    }

    #[test]
    fn test_name_is_last_resort() {
        let b = booking(Some("  "), None, "Alice");
        assert_eq!(resolve(&b), Some(ClientIdentity::Name("alice".to_string())));
        assert_eq!(resolve(&booking(None, None, "   ")), None);
    }

    #[test]
    fn test_id_identity_ignores_matching_phone() {
        // Same phone, different client record: not the same client under id matching.
        let identity = resolve(&booking(Some("c1"), Some("+1555"), "Alice")).unwrap();
        assert!(!identity.matches(&booking(Some("c2"), Some("+1555"), "Alice")));
        assert!(identity.matches(&booking(Some("c1"), None, "Someone Else")));
    }

    #[test]
    fn test_phone_identity_is_exact() {
        let identity = resolve(&booking(None, Some("+1555"), "Alice")).unwrap();
        assert!(identity.matches(&booking(None, Some("+1555"), "Bob")));
        assert!(!identity.matches(&booking(None, Some("+15550"), "Alice")));
    }

    #[test]
    fn test_name_identity_is_case_insensitive_substring() {
        let identity = resolve(&booking(None, None, "ann")).unwrap();
        assert!(identity.matches(&booking(None, None, "Ann Lee")));
        assert!(identity.matches(&booking(None, None, "JOANNA")));
        assert!(!identity.matches(&booking(None, None, "Bob")));
    }
}
