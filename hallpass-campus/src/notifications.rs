use std::sync::Arc;

use crate::{Database, DatabaseError, NotificationData, PrimaryKey};

/// Hands out the notifications the booking machinery leaves behind
pub struct NotificationManager<Db> {
    db: Arc<Db>,
}

impl<Db> NotificationManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    pub async fn for_user(
        &self,
        user_id: PrimaryKey,
    ) -> Result<Vec<NotificationData>, DatabaseError> {
        self.db.notifications_for_user(user_id).await
    }

    /// Marks one notification read. The user id scopes the lookup so nobody
    /// can flip someone else's notification.
    pub async fn mark_read(
        &self,
        notification_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<NotificationData, DatabaseError> {
        self.db
            .mark_notification_read(notification_id, user_id)
            .await
    }

    pub async fn mark_all_read(&self, user_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.db.mark_all_notifications_read(user_id).await
    }
}
