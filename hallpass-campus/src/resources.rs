use std::sync::Arc;

use chrono::NaiveDate;
use log::info;

use crate::{
    BlackoutApplication, BlackoutData, Database, DatabaseError, NewBlackout, NewResource,
    NewTimeslot, PrimaryKey, ResourceData, ResourceTimeslotData, TimeslotData, UpdatedResource,
};

pub struct ResourceManager<Db> {
    db: Arc<Db>,
}

impl<Db> ResourceManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    pub async fn all(&self) -> Result<Vec<ResourceData>, DatabaseError> {
        self.db.list_resources().await
    }

    pub async fn by_id(&self, resource_id: PrimaryKey) -> Result<ResourceData, DatabaseError> {
        self.db.resource_by_id(resource_id).await
    }

    pub async fn create(&self, new_resource: NewResource) -> Result<ResourceData, DatabaseError> {
        let resource = self.db.create_resource(new_resource).await?;

        info!(
            "Resource #{} ({}) created: {}",
            resource.id, resource.kind, resource.name
        );

        Ok(resource)
    }

    pub async fn update(
        &self,
        updated_resource: UpdatedResource,
    ) -> Result<ResourceData, DatabaseError> {
        self.db.update_resource(updated_resource).await
    }

    pub async fn delete(&self, resource_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.db.delete_resource(resource_id).await?;

        info!("Resource #{} deleted", resource_id);
        Ok(())
    }

    /// The shared timeslot catalog
    pub async fn timeslot_catalog(&self) -> Result<Vec<TimeslotData>, DatabaseError> {
        self.db.list_timeslots().await
    }

    /// Adds a new window to the shared catalog. Existing resources keep the
    /// offerings they already have, a fresh resource picks it up too.
    pub async fn add_timeslot(
        &self,
        new_timeslot: NewTimeslot,
    ) -> Result<TimeslotData, DatabaseError> {
        self.db.create_timeslot(new_timeslot).await
    }

    /// The catalog as offered by one resource, including withdrawn slots
    pub async fn offerings(
        &self,
        resource_id: PrimaryKey,
    ) -> Result<Vec<ResourceTimeslotData>, DatabaseError> {
        self.db.resource_timeslots(resource_id).await
    }

    pub async fn set_offering(
        &self,
        resource_id: PrimaryKey,
        timeslot_id: PrimaryKey,
        is_active: bool,
    ) -> Result<(), DatabaseError> {
        self.db
            .set_resource_timeslot(resource_id, timeslot_id, is_active)
            .await
    }

    pub async fn blackouts(
        &self,
        resource_id: PrimaryKey,
    ) -> Result<Vec<BlackoutData>, DatabaseError> {
        self.db.list_blackouts(resource_id).await
    }

    /// Blocks a date entirely, cancelling the bookings on it and notifying
    /// everyone affected. One transaction, all or nothing.
    pub async fn add_blackout(
        &self,
        new_blackout: NewBlackout,
    ) -> Result<BlackoutApplication, DatabaseError> {
        let application = self.db.apply_blackout(new_blackout).await?;

        info!(
            "Blackout on {} for resource #{}: {} booking(s) cancelled, {} user(s) notified",
            application.blackout.blackout_date,
            application.blackout.resource_id,
            application.cancelled.len(),
            application.notified_users
        );

        Ok(application)
    }

    pub async fn remove_blackout(
        &self,
        resource_id: PrimaryKey,
        date: NaiveDate,
    ) -> Result<(), DatabaseError> {
        self.db.remove_blackout(resource_id, date).await
    }
}
