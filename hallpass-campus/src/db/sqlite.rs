use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError, FromRow, SqliteConnection, SqlitePool,
};

use crate::{
    AvailabilityData, BlackoutApplication, BlackoutData, BookingData, BookingError,
    BookingStatsData, BookingStatus, Database, DatabaseError, DatabaseResult, IntoDatabaseError,
    KindCount, NewBlackout, NewBooking, NewResource, NewSession, NewTimeslot, NewUser,
    NotificationData, PrimaryKey, RescheduledBooking, ResourceData, ResourceKind,
    ResourceTimeslotData, Result, SessionData, TimeslotData, UpdatedBooking, UpdatedResource,
    UserData,
};

static MIGRATOR: Migrator = sqlx::migrate!();

/// Every booking row joined with its user, resource and timeslot
const BOOKING_SELECT: &str = "
    SELECT
        b.id, b.booking_date, b.quantity, b.status, b.purpose, b.created_at,
        u.id AS user_id, u.username, u.password,
        u.display_name AS user_display_name, u.admin AS user_admin,
        u.created_at AS user_created_at,
        r.id AS resource_id, r.name AS resource_name, r.kind AS resource_kind,
        r.capacity AS resource_capacity, r.quantity AS resource_quantity,
        r.location AS resource_location, r.description AS resource_description,
        r.image_path AS resource_image_path, r.created_at AS resource_created_at,
        t.id AS timeslot_id, t.label AS timeslot_label,
        t.start_time AS timeslot_start, t.end_time AS timeslot_end
    FROM bookings b
        INNER JOIN users u ON u.id = b.user_id
        INNER JOIN resources r ON r.id = b.resource_id
        LEFT JOIN timeslots t ON t.id = b.timeslot_id";

/// A SQLite database implementation for hallpass
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Opens (and creates, if missing) a database file at `path`.
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Self::migrate(pool).await
    }

    /// An isolated in-memory database, used by the test suites. The pool is
    /// pinned to a single connection that never closes, because every new
    /// in-memory connection would otherwise open its own empty store.
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn resource_in_tx(
        conn: &mut SqliteConnection,
        resource_id: PrimaryKey,
    ) -> Result<ResourceData> {
        let row: ResourceRow = sqlx::query_as("SELECT * FROM resources WHERE id = ?")
            .bind(resource_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| e.not_found_or("resource", "id"))?;

        Ok(row.into())
    }

    async fn booking_in_tx(
        conn: &mut SqliteConnection,
        booking_id: PrimaryKey,
    ) -> Result<BookingData> {
        let sql = format!("{BOOKING_SELECT} WHERE b.id = ?");

        let row: BookingRow = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| e.not_found_or("booking", "id"))?;

        Ok(row.into())
    }

    /// Copies the full timeslot catalog onto a resource the first time its
    /// slots are needed, all of them active.
    async fn materialize_timeslots(
        conn: &mut SqliteConnection,
        resource_id: PrimaryKey,
    ) -> Result<()> {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resource_timeslots WHERE resource_id = ?")
                .bind(resource_id)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| e.any())?;

        if existing == 0 {
            sqlx::query(
                "INSERT INTO resource_timeslots (resource_id, timeslot_id, is_active)
                 SELECT ?, id, 1 FROM timeslots",
            )
            .bind(resource_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| e.any())?;
        }

        Ok(())
    }

    async fn blackout_exists(
        conn: &mut SqliteConnection,
        resource_id: PrimaryKey,
        date: NaiveDate,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM resource_blackouts
             WHERE resource_id = ? AND blackout_date = ?",
        )
        .bind(resource_id)
        .bind(date)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| e.any())?;

        Ok(count > 0)
    }

    /// Units of a resource held by active bookings on a date, optionally
    /// ignoring one booking row (the one being edited).
    async fn booked_quantity(
        conn: &mut SqliteConnection,
        resource_id: PrimaryKey,
        date: NaiveDate,
        exclude: Option<PrimaryKey>,
    ) -> Result<i64> {
        let sql = match exclude {
            Some(_) => {
                "SELECT COALESCE(SUM(quantity), 0) FROM bookings
                 WHERE resource_id = ? AND booking_date = ? AND status = 'active' AND id <> ?"
            }
            None => {
                "SELECT COALESCE(SUM(quantity), 0) FROM bookings
                 WHERE resource_id = ? AND booking_date = ? AND status = 'active'"
            }
        };

        let mut query = sqlx::query_scalar(sql).bind(resource_id).bind(date);

        if let Some(booking_id) = exclude {
            query = query.bind(booking_id);
        }

        let total: i64 = query.fetch_one(&mut *conn).await.map_err(|e| e.any())?;
        Ok(total)
    }

    async fn slot_taken(
        conn: &mut SqliteConnection,
        resource_id: PrimaryKey,
        date: NaiveDate,
        timeslot_id: PrimaryKey,
        exclude: Option<PrimaryKey>,
    ) -> Result<bool> {
        let sql = match exclude {
            Some(_) => {
                "SELECT COUNT(*) FROM bookings
                 WHERE resource_id = ? AND booking_date = ? AND timeslot_id = ?
                    AND status = 'active' AND id <> ?"
            }
            None => {
                "SELECT COUNT(*) FROM bookings
                 WHERE resource_id = ? AND booking_date = ? AND timeslot_id = ?
                    AND status = 'active'"
            }
        };

        let mut query = sqlx::query_scalar(sql)
            .bind(resource_id)
            .bind(date)
            .bind(timeslot_id);

        if let Some(booking_id) = exclude {
            query = query.bind(booking_id);
        }

        let count: i64 = query.fetch_one(&mut *conn).await.map_err(|e| e.any())?;
        Ok(count > 0)
    }

    /// Checks every booking rule for a prospective (date, timeslot, quantity)
    /// against a resource. `exclude` leaves one existing row out of the
    /// conflict checks so a booking can be re-validated against everyone else.
    async fn check_booking_rules(
        conn: &mut SqliteConnection,
        resource: &ResourceData,
        date: NaiveDate,
        timeslot_id: Option<PrimaryKey>,
        quantity: i64,
        exclude: Option<PrimaryKey>,
    ) -> std::result::Result<(), BookingError> {
        if Self::blackout_exists(conn, resource.id, date).await? {
            return Err(BookingError::BlackedOut(date));
        }

        match resource.kind {
            ResourceKind::Equipment => {
                if quantity < 1 {
                    return Err(BookingError::InvalidQuantity);
                }

                let pool_size = resource.quantity.unwrap_or(0);
                let taken = Self::booked_quantity(conn, resource.id, date, exclude).await?;

                if taken + quantity > pool_size {
                    return Err(BookingError::EquipmentUnavailable {
                        available: (pool_size - taken).max(0),
                    });
                }
            }
            ResourceKind::Room | ResourceKind::Lab => {
                let timeslot_id = timeslot_id.ok_or(BookingError::MissingTimeslot)?;

                Self::materialize_timeslots(conn, resource.id).await?;

                let offering: Option<bool> = sqlx::query_scalar(
                    "SELECT is_active FROM resource_timeslots
                     WHERE resource_id = ? AND timeslot_id = ?",
                )
                .bind(resource.id)
                .bind(timeslot_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| e.any())?;

                if offering != Some(true) {
                    return Err(BookingError::InvalidTimeslot);
                }

                if Self::slot_taken(conn, resource.id, date, timeslot_id, exclude).await? {
                    return Err(BookingError::SlotTaken {
                        kind: resource.kind,
                    });
                }
            }
        }

        Ok(())
    }

    async fn push_notification(
        conn: &mut SqliteConnection,
        user_id: PrimaryKey,
        title: &str,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (user_id, title, message, is_read, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn check_for_admin(&self) -> Result<bool> {
        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE admin = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(admins > 0)
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?;

        Ok(row.into())
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))?;

        Ok(row.into())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        let result = sqlx::query(
            "INSERT INTO users (username, password, display_name, admin, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .bind(new_user.admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.user_by_id(result.last_insert_rowid()).await
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = sqlx::query_as(
            "SELECT
                sessions.id, sessions.token, sessions.expires_at,
                users.id AS user_id, users.username, users.password,
                users.display_name, users.admin,
                users.created_at AS user_created_at
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(row.into())
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn resource_by_id(&self, resource_id: PrimaryKey) -> Result<ResourceData> {
        let row: ResourceRow = sqlx::query_as("SELECT * FROM resources WHERE id = ?")
            .bind(resource_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("resource", "id"))?;

        Ok(row.into())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceData>> {
        let rows: Vec<ResourceRow> = sqlx::query_as("SELECT * FROM resources ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_resource(&self, new_resource: NewResource) -> Result<ResourceData> {
        let result = sqlx::query(
            "INSERT INTO resources
                (name, kind, capacity, quantity, location, description, image_path, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_resource.name)
        .bind(new_resource.kind)
        .bind(new_resource.capacity)
        .bind(new_resource.quantity)
        .bind(&new_resource.location)
        .bind(&new_resource.description)
        .bind(&new_resource.image_path)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.resource_by_id(result.last_insert_rowid()).await
    }

    async fn update_resource(&self, updated_resource: UpdatedResource) -> Result<ResourceData> {
        let resource = self.resource_by_id(updated_resource.id).await?;

        sqlx::query(
            "UPDATE resources SET
                name = ?,
                capacity = ?,
                quantity = ?,
                location = ?,
                description = ?,
                image_path = ?
            WHERE id = ?",
        )
        .bind(updated_resource.name.unwrap_or(resource.name))
        .bind(updated_resource.capacity.or(resource.capacity))
        .bind(updated_resource.quantity.or(resource.quantity))
        .bind(updated_resource.location.or(resource.location))
        .bind(updated_resource.description.or(resource.description))
        .bind(updated_resource.image_path.or(resource.image_path))
        .bind(updated_resource.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.resource_by_id(updated_resource.id).await
    }

    async fn delete_resource(&self, resource_id: PrimaryKey) -> Result<()> {
        // Ensure resource exists
        let _ = self.resource_by_id(resource_id).await?;

        // Bookings reference resources without a cascade, keeping history
        // intact. A resource with any booking row cannot be deleted.
        let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE resource_id = ?")
            .bind(resource_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if bookings > 0 {
            return Err(DatabaseError::Conflict {
                resource: "resource",
                field: "bookings",
                value: bookings.to_string(),
            });
        }

        sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(resource_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_timeslots(&self) -> Result<Vec<TimeslotData>> {
        let rows: Vec<TimeslotRow> =
            sqlx::query_as("SELECT * FROM timeslots ORDER BY start_time")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_timeslot(&self, new_timeslot: NewTimeslot) -> Result<TimeslotData> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM timeslots WHERE start_time = ? AND end_time = ?",
        )
        .bind(&new_timeslot.start_time)
        .bind(&new_timeslot.end_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("", ""))
        .conflict_or_ok(
            "timeslot",
            "window",
            format!("{}-{}", new_timeslot.start_time, new_timeslot.end_time).as_str(),
        )?;

        let result = sqlx::query("INSERT INTO timeslots (label, start_time, end_time) VALUES (?, ?, ?)")
            .bind(&new_timeslot.label)
            .bind(&new_timeslot.start_time)
            .bind(&new_timeslot.end_time)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        let row: TimeslotRow = sqlx::query_as("SELECT * FROM timeslots WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.into())
    }

    async fn resource_timeslots(
        &self,
        resource_id: PrimaryKey,
    ) -> Result<Vec<ResourceTimeslotData>> {
        // Ensure resource exists
        let _ = self.resource_by_id(resource_id).await?;

        let mut conn = self.pool.acquire().await.map_err(|e| e.any())?;
        Self::materialize_timeslots(&mut conn, resource_id).await?;

        let rows: Vec<ResourceTimeslotRow> = sqlx::query_as(
            "SELECT t.id, t.label, t.start_time, t.end_time, rt.is_active
             FROM resource_timeslots rt
                INNER JOIN timeslots t ON t.id = rt.timeslot_id
             WHERE rt.resource_id = ?
             ORDER BY t.start_time",
        )
        .bind(resource_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_resource_timeslot(
        &self,
        resource_id: PrimaryKey,
        timeslot_id: PrimaryKey,
        is_active: bool,
    ) -> Result<()> {
        // Ensure resource and timeslot exist
        let _ = self.resource_by_id(resource_id).await?;

        sqlx::query_scalar::<_, i64>("SELECT id FROM timeslots WHERE id = ?")
            .bind(timeslot_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("timeslot", "id"))?;

        let mut conn = self.pool.acquire().await.map_err(|e| e.any())?;
        Self::materialize_timeslots(&mut conn, resource_id).await?;

        sqlx::query(
            "UPDATE resource_timeslots SET is_active = ?
             WHERE resource_id = ? AND timeslot_id = ?",
        )
        .bind(is_active)
        .bind(resource_id)
        .bind(timeslot_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn list_blackouts(&self, resource_id: PrimaryKey) -> Result<Vec<BlackoutData>> {
        // Ensure resource exists
        let _ = self.resource_by_id(resource_id).await?;

        let rows: Vec<BlackoutRow> = sqlx::query_as(
            "SELECT * FROM resource_blackouts WHERE resource_id = ? ORDER BY blackout_date",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn apply_blackout(&self, new_blackout: NewBlackout) -> Result<BlackoutApplication> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let resource = Self::resource_in_tx(&mut tx, new_blackout.resource_id).await?;

        // One row per (resource, date). Re-applying refreshes the reason.
        sqlx::query(
            "INSERT INTO resource_blackouts (resource_id, blackout_date, reason, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (resource_id, blackout_date) DO UPDATE SET reason = excluded.reason",
        )
        .bind(resource.id)
        .bind(new_blackout.blackout_date)
        .bind(&new_blackout.reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let reason_suffix = new_blackout
            .reason
            .as_deref()
            .map(|reason| format!(": {reason}"))
            .unwrap_or_default();

        // Everyone still holding an upcoming booking here gets a notice.
        let today = Utc::now().date_naive();
        let user_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM bookings
             WHERE resource_id = ? AND status = 'active' AND booking_date >= ?",
        )
        .bind(resource.id)
        .bind(today)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let notice = format!(
            "{} is unavailable on {}{}",
            resource.name, new_blackout.blackout_date, reason_suffix
        );

        for user_id in &user_ids {
            Self::push_notification(&mut tx, *user_id, "Resource Unavailable", &notice).await?;
        }

        // Bookings that land exactly on the blackout date get cancelled.
        let sql = format!(
            "{BOOKING_SELECT} WHERE b.resource_id = ? AND b.booking_date = ? AND b.status = 'active'"
        );

        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(resource.id)
            .bind(new_blackout.blackout_date)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let mut cancelled = Vec::with_capacity(rows.len());

        for row in rows {
            let mut booking = BookingData::from(row);

            sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE id = ?")
                .bind(booking.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;

            booking.status = BookingStatus::Cancelled;

            let when = match &booking.timeslot {
                Some(slot) => format!("{} ({})", booking.booking_date, slot.label),
                None => booking.booking_date.to_string(),
            };

            let message = format!(
                "Your booking of {} on {} was cancelled{}",
                resource.name, when, reason_suffix
            );

            Self::push_notification(&mut tx, booking.user.id, "Booking Cancelled", &message)
                .await?;

            cancelled.push(booking);
        }

        let row: BlackoutRow = sqlx::query_as(
            "SELECT * FROM resource_blackouts WHERE resource_id = ? AND blackout_date = ?",
        )
        .bind(resource.id)
        .bind(new_blackout.blackout_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(BlackoutApplication {
            blackout: row.into(),
            cancelled,
            notified_users: user_ids.len() as i64,
        })
    }

    async fn remove_blackout(&self, resource_id: PrimaryKey, date: NaiveDate) -> Result<()> {
        let blackout_id: i64 = sqlx::query_scalar(
            "SELECT id FROM resource_blackouts WHERE resource_id = ? AND blackout_date = ?",
        )
        .bind(resource_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("blackout", "resource_id:date"))?;

        sqlx::query("DELETE FROM resource_blackouts WHERE id = ?")
            .bind(blackout_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn booking_by_id(&self, booking_id: PrimaryKey) -> Result<BookingData> {
        let sql = format!("{BOOKING_SELECT} WHERE b.id = ?");

        let row: BookingRow = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("booking", "id"))?;

        Ok(row.into())
    }

    async fn bookings_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BookingData>> {
        let sql = format!("{BOOKING_SELECT} WHERE b.user_id = ? ORDER BY b.created_at DESC");

        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_bookings(&self) -> Result<Vec<BookingData>> {
        let sql = format!("{BOOKING_SELECT} ORDER BY b.created_at DESC");

        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_booking(
        &self,
        new_booking: NewBooking,
    ) -> std::result::Result<BookingData, BookingError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // The user is looked up inside the transaction, so a deleted account
        // cannot insert through a stale handle.
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
            .bind(new_booking.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.any())?
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        let resource = Self::resource_in_tx(&mut tx, new_booking.resource_id).await?;

        let quantity = match resource.kind {
            ResourceKind::Equipment => new_booking.quantity.unwrap_or(1),
            _ => 1,
        };

        let timeslot_id = match resource.kind {
            ResourceKind::Equipment => None,
            _ => new_booking.timeslot_id,
        };

        Self::check_booking_rules(
            &mut tx,
            &resource,
            new_booking.booking_date,
            timeslot_id,
            quantity,
            None,
        )
        .await?;

        let result = sqlx::query(
            "INSERT INTO bookings
                (user_id, resource_id, booking_date, timeslot_id, quantity, status, purpose, created_at)
             VALUES (?, ?, ?, ?, ?, 'active', ?, ?)",
        )
        .bind(new_booking.user_id)
        .bind(resource.id)
        .bind(new_booking.booking_date)
        .bind(timeslot_id)
        .bind(quantity)
        .bind(&new_booking.purpose)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| slot_conflict_or_db(e, resource.kind))?;

        let booking = Self::booking_in_tx(&mut tx, result.last_insert_rowid()).await?;

        tx.commit().await.map_err(|e| e.any())?;
        Ok(booking)
    }

    async fn update_booking(
        &self,
        updated_booking: UpdatedBooking,
    ) -> std::result::Result<BookingData, BookingError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let current = Self::booking_in_tx(&mut tx, updated_booking.id).await?;

        if current.status != BookingStatus::Active {
            return Err(BookingError::InvalidStatus(current.status));
        }

        let resource = current.resource.clone();
        let date = updated_booking.booking_date.unwrap_or(current.booking_date);

        let timeslot_id = match resource.kind {
            ResourceKind::Equipment => None,
            _ => updated_booking
                .timeslot_id
                .or(current.timeslot.as_ref().map(|slot| slot.id)),
        };

        let quantity = match resource.kind {
            ResourceKind::Equipment => updated_booking.quantity.unwrap_or(current.quantity),
            _ => 1,
        };

        Self::check_booking_rules(
            &mut tx,
            &resource,
            date,
            timeslot_id,
            quantity,
            Some(current.id),
        )
        .await?;

        sqlx::query(
            "UPDATE bookings SET booking_date = ?, timeslot_id = ?, quantity = ?, purpose = ?
             WHERE id = ?",
        )
        .bind(date)
        .bind(timeslot_id)
        .bind(quantity)
        .bind(updated_booking.purpose.or(current.purpose))
        .bind(current.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| slot_conflict_or_db(e, resource.kind))?;

        let booking = Self::booking_in_tx(&mut tx, current.id).await?;

        tx.commit().await.map_err(|e| e.any())?;
        Ok(booking)
    }

    async fn reschedule_booking(
        &self,
        reschedule: RescheduledBooking,
    ) -> std::result::Result<BookingData, BookingError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let original = Self::booking_in_tx(&mut tx, reschedule.id).await?;

        if original.status != BookingStatus::Active {
            return Err(BookingError::InvalidStatus(original.status));
        }

        let resource = original.resource.clone();

        let timeslot_id = match resource.kind {
            ResourceKind::Equipment => None,
            _ => reschedule
                .timeslot_id
                .or(original.timeslot.as_ref().map(|slot| slot.id)),
        };

        let quantity = match resource.kind {
            ResourceKind::Equipment => reschedule.quantity.unwrap_or(original.quantity),
            _ => 1,
        };

        Self::check_booking_rules(
            &mut tx,
            &resource,
            reschedule.booking_date,
            timeslot_id,
            quantity,
            Some(original.id),
        )
        .await?;

        // The original is kept as an audit row and a fresh active booking
        // takes its place. Both changes land in the same transaction.
        sqlx::query("UPDATE bookings SET status = 'rescheduled' WHERE id = ?")
            .bind(original.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let result = sqlx::query(
            "INSERT INTO bookings
                (user_id, resource_id, booking_date, timeslot_id, quantity, status, purpose, created_at)
             VALUES (?, ?, ?, ?, ?, 'active', ?, ?)",
        )
        .bind(original.user.id)
        .bind(resource.id)
        .bind(reschedule.booking_date)
        .bind(timeslot_id)
        .bind(quantity)
        .bind(&original.purpose)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| slot_conflict_or_db(e, resource.kind))?;

        let booking = Self::booking_in_tx(&mut tx, result.last_insert_rowid()).await?;

        tx.commit().await.map_err(|e| e.any())?;
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        booking_id: PrimaryKey,
    ) -> std::result::Result<BookingData, BookingError> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let current = Self::booking_in_tx(&mut tx, booking_id).await?;

        if current.status != BookingStatus::Active {
            return Err(BookingError::InvalidStatus(current.status));
        }

        sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE id = ?")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        let booking = Self::booking_in_tx(&mut tx, booking_id).await?;

        tx.commit().await.map_err(|e| e.any())?;
        Ok(booking)
    }

    async fn resource_availability(
        &self,
        resource_id: PrimaryKey,
        date: NaiveDate,
    ) -> Result<AvailabilityData> {
        // Materialization may write, so even this query runs in a transaction.
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let resource = Self::resource_in_tx(&mut tx, resource_id).await?;

        if Self::blackout_exists(&mut tx, resource_id, date).await? {
            tx.commit().await.map_err(|e| e.any())?;

            return Ok(AvailabilityData {
                available: vec![],
                booked: vec![],
                remaining_quantity: Some(0),
            });
        }

        let availability = match resource.kind {
            ResourceKind::Equipment => {
                let pool_size = resource.quantity.unwrap_or(0);
                let taken = Self::booked_quantity(&mut tx, resource_id, date, None).await?;

                AvailabilityData {
                    available: vec![],
                    booked: vec![],
                    remaining_quantity: Some((pool_size - taken).max(0)),
                }
            }
            ResourceKind::Room | ResourceKind::Lab => {
                Self::materialize_timeslots(&mut tx, resource_id).await?;

                let offered: Vec<TimeslotRow> = sqlx::query_as(
                    "SELECT t.id, t.label, t.start_time, t.end_time
                     FROM resource_timeslots rt
                        INNER JOIN timeslots t ON t.id = rt.timeslot_id
                     WHERE rt.resource_id = ? AND rt.is_active = 1
                     ORDER BY t.start_time",
                )
                .bind(resource_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                let taken_ids: Vec<i64> = sqlx::query_scalar(
                    "SELECT timeslot_id FROM bookings
                     WHERE resource_id = ? AND booking_date = ?
                        AND status = 'active' AND timeslot_id IS NOT NULL",
                )
                .bind(resource_id)
                .bind(date)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| e.any())?;

                let (booked, available): (Vec<TimeslotData>, Vec<TimeslotData>) = offered
                    .into_iter()
                    .map(TimeslotData::from)
                    .partition(|slot| taken_ids.contains(&slot.id));

                AvailabilityData {
                    available,
                    booked,
                    remaining_quantity: None,
                }
            }
        };

        tx.commit().await.map_err(|e| e.any())?;
        Ok(availability)
    }

    async fn booking_stats(&self) -> Result<BookingStatsData> {
        let today = Utc::now().date_naive();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE status = 'active' AND booking_date >= ?",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let completed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE status = 'active' AND booking_date < ?",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let cancelled: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = 'cancelled'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.any())?;

        let rescheduled: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = 'rescheduled'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.any())?;

        let by_kind: Vec<(ResourceKind, i64)> = sqlx::query_as(
            "SELECT r.kind, COUNT(*) FROM bookings b
                INNER JOIN resources r ON r.id = b.resource_id
             GROUP BY r.kind",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(BookingStatsData {
            total,
            active,
            completed,
            cancelled,
            rescheduled,
            by_kind: by_kind
                .into_iter()
                .map(|(kind, count)| KindCount { kind, count })
                .collect(),
        })
    }

    async fn notifications_for_user(&self, user_id: PrimaryKey) -> Result<Vec<NotificationData>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_notification_read(
        &self,
        notification_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<NotificationData> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "notification",
                identifier: "id",
            });
        }

        let row: NotificationRow = sqlx::query_as("SELECT * FROM notifications WHERE id = ?")
            .bind(notification_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.into())
    }

    async fn mark_all_notifications_read(&self, user_id: PrimaryKey) -> Result<()> {
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

/// Translates a unique index violation on the active-slot index into the
/// conflict the rules would have reported, for races that slip past them.
fn slot_conflict_or_db(e: SqlxError, kind: ResourceKind) -> BookingError {
    match &e {
        SqlxError::Database(db) if db.is_unique_violation() => BookingError::SlotTaken { kind },
        _ => BookingError::Db(e.any()),
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    display_name: String,
    admin: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            display_name: row.display_name,
            admin: row.admin,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: i64,
    username: String,
    password: String,
    display_name: String,
    admin: bool,
    user_created_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
                admin: row.admin,
                created_at: row.user_created_at,
            },
        }
    }
}

#[derive(FromRow)]
struct ResourceRow {
    id: i64,
    name: String,
    kind: ResourceKind,
    capacity: Option<i64>,
    quantity: Option<i64>,
    location: Option<String>,
    description: Option<String>,
    image_path: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ResourceRow> for ResourceData {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: row.kind,
            capacity: row.capacity,
            quantity: row.quantity,
            location: row.location,
            description: row.description,
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct TimeslotRow {
    id: i64,
    label: String,
    start_time: String,
    end_time: String,
}

impl From<TimeslotRow> for TimeslotData {
    fn from(row: TimeslotRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

#[derive(FromRow)]
struct ResourceTimeslotRow {
    id: i64,
    label: String,
    start_time: String,
    end_time: String,
    is_active: bool,
}

impl From<ResourceTimeslotRow> for ResourceTimeslotData {
    fn from(row: ResourceTimeslotRow) -> Self {
        Self {
            timeslot: TimeslotData {
                id: row.id,
                label: row.label,
                start_time: row.start_time,
                end_time: row.end_time,
            },
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: i64,
    booking_date: NaiveDate,
    quantity: i64,
    status: BookingStatus,
    purpose: Option<String>,
    created_at: DateTime<Utc>,
    user_id: i64,
    username: String,
    password: String,
    user_display_name: String,
    user_admin: bool,
    user_created_at: DateTime<Utc>,
    resource_id: i64,
    resource_name: String,
    resource_kind: ResourceKind,
    resource_capacity: Option<i64>,
    resource_quantity: Option<i64>,
    resource_location: Option<String>,
    resource_description: Option<String>,
    resource_image_path: Option<String>,
    resource_created_at: DateTime<Utc>,
    timeslot_id: Option<i64>,
    timeslot_label: Option<String>,
    timeslot_start: Option<String>,
    timeslot_end: Option<String>,
}

impl From<BookingRow> for BookingData {
    fn from(row: BookingRow) -> Self {
        let timeslot = match (
            row.timeslot_id,
            row.timeslot_label,
            row.timeslot_start,
            row.timeslot_end,
        ) {
            (Some(id), Some(label), Some(start_time), Some(end_time)) => Some(TimeslotData {
                id,
                label,
                start_time,
                end_time,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.user_display_name,
                admin: row.user_admin,
                created_at: row.user_created_at,
            },
            resource: ResourceData {
                id: row.resource_id,
                name: row.resource_name,
                kind: row.resource_kind,
                capacity: row.resource_capacity,
                quantity: row.resource_quantity,
                location: row.resource_location,
                description: row.resource_description,
                image_path: row.resource_image_path,
                created_at: row.resource_created_at,
            },
            booking_date: row.booking_date,
            timeslot,
            quantity: row.quantity,
            status: row.status,
            purpose: row.purpose,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct BlackoutRow {
    id: i64,
    resource_id: i64,
    blackout_date: NaiveDate,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BlackoutRow> for BlackoutData {
    fn from(row: BlackoutRow) -> Self {
        Self {
            id: row.id,
            resource_id: row.resource_id,
            blackout_date: row.blackout_date,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    title: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationData {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}
