use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod sqlite;
pub use sqlite::*;

use crate::bookings::BookingError;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and fetch hallpass data.
///
/// Booking mutations return [BookingError] because they enforce the booking
/// rules inside their own transaction, everything else speaks [DatabaseError].
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn check_for_admin(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn resource_by_id(&self, resource_id: PrimaryKey) -> Result<ResourceData>;
    async fn list_resources(&self) -> Result<Vec<ResourceData>>;
    async fn create_resource(&self, new_resource: NewResource) -> Result<ResourceData>;
    async fn update_resource(&self, updated_resource: UpdatedResource) -> Result<ResourceData>;
    async fn delete_resource(&self, resource_id: PrimaryKey) -> Result<()>;

    async fn list_timeslots(&self) -> Result<Vec<TimeslotData>>;
    async fn create_timeslot(&self, new_timeslot: NewTimeslot) -> Result<TimeslotData>;
    async fn resource_timeslots(
        &self,
        resource_id: PrimaryKey,
    ) -> Result<Vec<ResourceTimeslotData>>;
    async fn set_resource_timeslot(
        &self,
        resource_id: PrimaryKey,
        timeslot_id: PrimaryKey,
        is_active: bool,
    ) -> Result<()>;

    async fn list_blackouts(&self, resource_id: PrimaryKey) -> Result<Vec<BlackoutData>>;
    async fn apply_blackout(&self, new_blackout: NewBlackout) -> Result<BlackoutApplication>;
    async fn remove_blackout(&self, resource_id: PrimaryKey, date: NaiveDate) -> Result<()>;

    async fn booking_by_id(&self, booking_id: PrimaryKey) -> Result<BookingData>;
    async fn bookings_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BookingData>>;
    async fn list_bookings(&self) -> Result<Vec<BookingData>>;
    async fn create_booking(
        &self,
        new_booking: NewBooking,
    ) -> std::result::Result<BookingData, BookingError>;
    async fn update_booking(
        &self,
        updated_booking: UpdatedBooking,
    ) -> std::result::Result<BookingData, BookingError>;
    async fn reschedule_booking(
        &self,
        reschedule: RescheduledBooking,
    ) -> std::result::Result<BookingData, BookingError>;
    async fn cancel_booking(
        &self,
        booking_id: PrimaryKey,
    ) -> std::result::Result<BookingData, BookingError>;
    async fn resource_availability(
        &self,
        resource_id: PrimaryKey,
        date: NaiveDate,
    ) -> Result<AvailabilityData>;
    async fn booking_stats(&self) -> Result<BookingStatsData>;

    async fn notifications_for_user(&self, user_id: PrimaryKey) -> Result<Vec<NotificationData>>;
    async fn mark_notification_read(
        &self,
        notification_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<NotificationData>;
    async fn mark_all_notifications_read(&self, user_id: PrimaryKey) -> Result<()>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub admin: bool,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewResource {
    pub name: String,
    pub kind: ResourceKind,
    pub capacity: Option<i64>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug)]
pub struct UpdatedResource {
    pub id: PrimaryKey,
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug)]
pub struct NewTimeslot {
    pub label: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug)]
pub struct NewBlackout {
    pub resource_id: PrimaryKey,
    pub blackout_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct NewBooking {
    /// The user the booking is held by
    pub user_id: PrimaryKey,
    pub resource_id: PrimaryKey,
    pub booking_date: NaiveDate,
    /// Required for rooms and labs, ignored for equipment
    pub timeslot_id: Option<PrimaryKey>,
    /// Defaults to 1 for equipment, forced to 1 otherwise
    pub quantity: Option<i64>,
    pub purpose: Option<String>,
}

#[derive(Debug)]
pub struct UpdatedBooking {
    pub id: PrimaryKey,
    pub booking_date: Option<NaiveDate>,
    pub timeslot_id: Option<PrimaryKey>,
    pub quantity: Option<i64>,
    pub purpose: Option<String>,
}

#[derive(Debug)]
pub struct RescheduledBooking {
    pub id: PrimaryKey,
    pub booking_date: NaiveDate,
    /// Falls back to the original booking's timeslot when omitted
    pub timeslot_id: Option<PrimaryKey>,
    pub quantity: Option<i64>,
}
