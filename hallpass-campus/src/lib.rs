mod auth;
mod bookings;
mod db;
mod notifications;
mod resources;
mod util;

use std::sync::Arc;

pub use auth::*;
pub use bookings::*;
pub use db::*;
pub use notifications::*;
pub use resources::*;

/// The hallpass campus system, facilitating resource booking, authentication, and more.
pub struct Campus<Db> {
    database: Arc<Db>,

    pub auth: Auth<Db>,
    pub bookings: BookingManager<Db>,
    pub resources: ResourceManager<Db>,
    pub notifications: NotificationManager<Db>,
}

impl<Db> Campus<Db>
where
    Db: Database,
{
    pub fn new(database: Db) -> Self {
        let database = Arc::new(database);

        Self {
            auth: Auth::new(&database),
            bookings: BookingManager::new(&database),
            resources: ResourceManager::new(&database),
            notifications: NotificationManager::new(&database),
            database,
        }
    }

    /// Direct access to the underlying store
    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }
}
