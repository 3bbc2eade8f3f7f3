use std::{env, sync::Arc};

use colored::Colorize;
use hallpass_campus::{AuthError, Campus, DatabaseError, NewPlainUser, SqliteDatabase};
use hallpass_server::{run_server, CampusInstance, ServerContext};
use log::{error, info, warn};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum StartupError {
    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl StartupError {
    fn hint(&self) -> String {
        match self {
            StartupError::Database(_) => {
                "This is a database error. Make sure the database file is writable, then try again."
                    .to_string()
            }
            StartupError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

async fn init() -> Result<ServerContext, StartupError> {
    let path = env::var("HALLPASS_DATABASE").unwrap_or_else(|_| "hallpass.db".to_string());

    info!("Connecting to database...");

    let database = SqliteDatabase::new(&path).await?;
    let campus = Arc::new(Campus::new(database));

    seed_admin(&campus).await?;

    Ok(ServerContext { campus })
}

/// Creates the admin account from the environment, unless one exists already
async fn seed_admin(campus: &Arc<CampusInstance>) -> Result<(), StartupError> {
    let (Ok(username), Ok(password)) = (
        env::var("HALLPASS_ADMIN_USERNAME"),
        env::var("HALLPASS_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };

    let display_name = env::var("HALLPASS_ADMIN_DISPLAY_NAME").unwrap_or_else(|_| username.clone());

    match campus
        .auth
        .register_admin(NewPlainUser {
            username,
            password,
            display_name,
        })
        .await
    {
        Ok(user) => info!("Admin account {} created", user.username),
        Err(AuthError::AdminExists) => {}
        Err(e) => return Err(StartupError::Fatal(e.to_string())),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    match init().await {
        Ok(context) => {
            info!("Initialized successfully.");
            run_server(context).await;
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "hallpass failed to start!".bold().red()
            );
            error!("{}", error);
            warn!("{}", format!("Hint: {}", error.hint()).italic());
        }
    }
}
