#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::NaiveDate;
use log::info;
use thiserror::Error;

use crate::{
    AvailabilityData, BookingData, BookingStatsData, BookingStatus, Database, DatabaseError,
    NewBooking, PrimaryKey, RescheduledBooking, ResourceKind, UpdatedBooking, UserData,
};

pub struct BookingManager<Db> {
    db: Arc<Db>,
}

#[derive(Debug, Error)]
pub enum BookingError {
    /// Rooms and labs are booked by timeslot
    #[error("A timeslot is required for this resource")]
    MissingTimeslot,
    #[error("Requested quantity must be at least 1")]
    InvalidQuantity,
    /// The timeslot doesn't exist or the resource has withdrawn it
    #[error("Timeslot is not offered by this resource")]
    InvalidTimeslot,
    #[error("Resource is unavailable on {0}")]
    BlackedOut(NaiveDate),
    #[error("{kind} is already booked for this timeslot")]
    SlotTaken { kind: ResourceKind },
    #[error("Only {available} unit(s) left on this date")]
    EquipmentUnavailable { available: i64 },
    /// The booking has left the active state
    #[error("Booking is {0} and cannot change")]
    InvalidStatus(BookingStatus),
    #[error("Only the booking owner or an admin can do this")]
    NotPermitted,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl<Db> BookingManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// Books a resource for a user
    pub async fn create(&self, new_booking: NewBooking) -> Result<BookingData, BookingError> {
        let booking = self.db.create_booking(new_booking).await?;

        info!(
            "Booking #{} created: {} on {} for {}",
            booking.id, booking.resource.name, booking.booking_date, booking.user.username
        );

        Ok(booking)
    }

    /// Edits an active booking in place, re-checking every booking rule
    pub async fn update(
        &self,
        caller: &UserData,
        updated_booking: UpdatedBooking,
    ) -> Result<BookingData, BookingError> {
        self.authorize(caller, updated_booking.id).await?;
        self.db.update_booking(updated_booking).await
    }

    /// Moves an active booking by retiring it into a `rescheduled` audit row
    /// and creating a fresh active booking in its place
    pub async fn reschedule(
        &self,
        caller: &UserData,
        reschedule: RescheduledBooking,
    ) -> Result<BookingData, BookingError> {
        let original_id = reschedule.id;
        self.authorize(caller, original_id).await?;

        let booking = self.db.reschedule_booking(reschedule).await?;

        info!("Booking #{} rescheduled as #{}", original_id, booking.id);
        Ok(booking)
    }

    pub async fn cancel(
        &self,
        caller: &UserData,
        booking_id: PrimaryKey,
    ) -> Result<BookingData, BookingError> {
        self.authorize(caller, booking_id).await?;

        let booking = self.db.cancel_booking(booking_id).await?;

        info!("Booking #{} cancelled", booking.id);
        Ok(booking)
    }

    /// What can still be booked on a resource for a given date
    pub async fn availability(
        &self,
        resource_id: PrimaryKey,
        date: NaiveDate,
    ) -> Result<AvailabilityData, DatabaseError> {
        self.db.resource_availability(resource_id, date).await
    }

    pub async fn for_user(&self, user_id: PrimaryKey) -> Result<Vec<BookingData>, DatabaseError> {
        self.db.bookings_for_user(user_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<BookingData>, DatabaseError> {
        self.db.list_bookings().await
    }

    pub async fn stats(&self) -> Result<BookingStatsData, DatabaseError> {
        self.db.booking_stats().await
    }

    /// Booking mutations are allowed for the owner and for admins
    async fn authorize(
        &self,
        caller: &UserData,
        booking_id: PrimaryKey,
    ) -> Result<(), BookingError> {
        let booking = self.db.booking_by_id(booking_id).await?;

        if booking.user.id != caller.id && !caller.admin {
            return Err(BookingError::NotPermitted);
        }

        Ok(())
    }
}
