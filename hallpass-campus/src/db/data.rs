use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDate, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i64;

/// What a resource is, which decides how it gets booked:
/// rooms and labs hold one booking per timeslot, equipment is a pool of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ResourceKind {
    Room,
    Lab,
    Equipment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Lab => "lab",
            Self::Equipment => "equipment",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The stored lifecycle state of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
        }
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booking state as presented to clients. `Completed` is never stored,
/// it is derived from an active booking whose date has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Active,
    Completed,
    Cancelled,
    Rescheduled,
}

impl DisplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rescheduled => "rescheduled",
        }
    }
}

/// A hallpass account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub password: String,
    pub display_name: String,
    /// If this is true, the user can manage resources and see every booking
    pub admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A bookable campus resource
#[derive(Debug, Clone)]
pub struct ResourceData {
    pub id: PrimaryKey,
    pub name: String,
    pub kind: ResourceKind,
    /// Seats, set for rooms and labs
    pub capacity: Option<i64>,
    /// Units in the pool, set for equipment
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A time window from the shared catalog
#[derive(Debug, Clone)]
pub struct TimeslotData {
    pub id: PrimaryKey,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
}

/// A catalog timeslot as offered (or withdrawn) by one resource
#[derive(Debug, Clone)]
pub struct ResourceTimeslotData {
    pub timeslot: TimeslotData,
    pub is_active: bool,
}

/// A booking, joined with its user, resource and timeslot
#[derive(Debug, Clone)]
pub struct BookingData {
    pub id: PrimaryKey,
    pub user: UserData,
    pub resource: ResourceData,
    pub booking_date: NaiveDate,
    /// Set for rooms and labs, never for equipment
    pub timeslot: Option<TimeslotData>,
    pub quantity: i64,
    pub status: BookingStatus,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingData {
    /// The status shown to clients, where an active booking with a past
    /// date reads as completed without a stored state change.
    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        match self.status {
            BookingStatus::Active if self.booking_date < today => DisplayStatus::Completed,
            BookingStatus::Active => DisplayStatus::Active,
            BookingStatus::Cancelled => DisplayStatus::Cancelled,
            BookingStatus::Rescheduled => DisplayStatus::Rescheduled,
        }
    }
}

/// A date on which a resource cannot be booked at all
#[derive(Debug, Clone)]
pub struct BlackoutData {
    pub id: PrimaryKey,
    pub resource_id: PrimaryKey,
    pub blackout_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What applying a blackout did, returned so callers can report it
#[derive(Debug, Clone)]
pub struct BlackoutApplication {
    pub blackout: BlackoutData,
    /// Active bookings on the blackout date that were cancelled
    pub cancelled: Vec<BookingData>,
    /// How many users got the general unavailability notice
    pub notified_users: i64,
}

/// A persisted message shown to a user until they mark it read
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Bookable state of one resource on one date
#[derive(Debug, Clone)]
pub struct AvailabilityData {
    /// Offered timeslots still open on that date, for rooms and labs
    pub available: Vec<TimeslotData>,
    /// Offered timeslots already taken on that date, for rooms and labs
    pub booked: Vec<TimeslotData>,
    /// Units still bookable on that date, for equipment. Zero on a blackout.
    pub remaining_quantity: Option<i64>,
}

/// Aggregate booking numbers for the admin dashboard
#[derive(Debug, Clone)]
pub struct BookingStatsData {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub rescheduled: i64,
    pub by_kind: Vec<KindCount>,
}

/// How many bookings target resources of one kind
#[derive(Debug, Clone)]
pub struct KindCount {
    pub kind: ResourceKind,
    pub count: i64,
}
