//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, NaiveDate, Utc};
use hallpass_campus::{
    AvailabilityData, BlackoutApplication, BlackoutData, BookingData, BookingStatsData, KindCount,
    NotificationData, ResourceData, ResourceTimeslotData, SessionData, TimeslotData, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i64,
    username: String,
    display_name: String,
    admin: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    id: i64,
    name: String,
    kind: String,
    capacity: Option<i64>,
    quantity: Option<i64>,
    location: Option<String>,
    description: Option<String>,
    image_path: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timeslot {
    id: i64,
    label: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTimeslot {
    timeslot: Timeslot,
    is_active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    id: i64,
    user: User,
    resource: Resource,
    booking_date: NaiveDate,
    timeslot: Option<Timeslot>,
    quantity: i64,
    /// One of active, completed, cancelled or rescheduled
    status: String,
    purpose: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    available: Vec<Timeslot>,
    booked: Vec<Timeslot>,
    remaining_quantity: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Blackout {
    id: i64,
    resource_id: i64,
    blackout_date: NaiveDate,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutResult {
    blackout: Blackout,
    cancelled_bookings: Vec<Booking>,
    notified_users: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: i64,
    title: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KindBookings {
    kind: String,
    count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    total: i64,
    active: i64,
    completed: i64,
    cancelled: i64,
    rescheduled: i64,
    by_kind: Vec<KindBookings>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            admin: self.admin,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Resource> for ResourceData {
    fn to_serialized(&self) -> Resource {
        Resource {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.to_string(),
            capacity: self.capacity,
            quantity: self.quantity,
            location: self.location.clone(),
            description: self.description.clone(),
            image_path: self.image_path.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Timeslot> for TimeslotData {
    fn to_serialized(&self) -> Timeslot {
        Timeslot {
            id: self.id,
            label: self.label.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }
}

impl ToSerialized<ResourceTimeslot> for ResourceTimeslotData {
    fn to_serialized(&self) -> ResourceTimeslot {
        ResourceTimeslot {
            timeslot: self.timeslot.to_serialized(),
            is_active: self.is_active,
        }
    }
}

impl ToSerialized<Booking> for BookingData {
    fn to_serialized(&self) -> Booking {
        let today = Utc::now().date_naive();

        Booking {
            id: self.id,
            user: self.user.to_serialized(),
            resource: self.resource.to_serialized(),
            booking_date: self.booking_date,
            timeslot: self.timeslot.as_ref().map(|x| x.to_serialized()),
            quantity: self.quantity,
            status: self.display_status(today).as_str().to_string(),
            purpose: self.purpose.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Availability> for AvailabilityData {
    fn to_serialized(&self) -> Availability {
        Availability {
            available: self.available.to_serialized(),
            booked: self.booked.to_serialized(),
            remaining_quantity: self.remaining_quantity,
        }
    }
}

impl ToSerialized<Blackout> for BlackoutData {
    fn to_serialized(&self) -> Blackout {
        Blackout {
            id: self.id,
            resource_id: self.resource_id,
            blackout_date: self.blackout_date,
            reason: self.reason.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<BlackoutResult> for BlackoutApplication {
    fn to_serialized(&self) -> BlackoutResult {
        BlackoutResult {
            blackout: self.blackout.to_serialized(),
            cancelled_bookings: self.cancelled.to_serialized(),
            notified_users: self.notified_users,
        }
    }
}

impl ToSerialized<Notification> for NotificationData {
    fn to_serialized(&self) -> Notification {
        Notification {
            id: self.id,
            title: self.title.clone(),
            message: self.message.clone(),
            is_read: self.is_read,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<KindBookings> for KindCount {
    fn to_serialized(&self) -> KindBookings {
        KindBookings {
            kind: self.kind.to_string(),
            count: self.count,
        }
    }
}

impl ToSerialized<BookingStats> for BookingStatsData {
    fn to_serialized(&self) -> BookingStats {
        BookingStats {
            total: self.total,
            active: self.active,
            completed: self.completed,
            cancelled: self.cancelled,
            rescheduled: self.rescheduled,
            by_kind: self.by_kind.to_serialized(),
        }
    }
}
