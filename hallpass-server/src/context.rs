use std::sync::Arc;

use axum::extract::FromRef;
use hallpass_campus::{Campus, SqliteDatabase};

/// The campus type the server is wired to
pub type CampusInstance = Campus<SqliteDatabase>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub campus: Arc<CampusInstance>,
}
