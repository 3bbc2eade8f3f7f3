use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hallpass_campus::{AuthError, BookingError, DatabaseError, ResourceKind};
use log::error;
use serde_json::json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidBody(&'static str),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin account already exists")]
    AdminExists,
    #[error(transparent)]
    Booking(BookingError),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::AdminExists => StatusCode::CONFLICT,
            Self::Conflict {
                resource: _,
                field: _,
                value: _,
            } => StatusCode::CONFLICT,
            Self::NotFound {
                resource: _,
                identifier: _,
            } => StatusCode::NOT_FOUND,
            Self::Booking(e) => match e {
                BookingError::MissingTimeslot
                | BookingError::InvalidQuantity
                | BookingError::InvalidTimeslot => StatusCode::BAD_REQUEST,
                BookingError::BlackedOut(_)
                | BookingError::SlotTaken { .. }
                | BookingError::EquipmentUnavailable { .. }
                | BookingError::InvalidStatus(_) => StatusCode::CONFLICT,
                BookingError::NotPermitted => StatusCode::FORBIDDEN,
                BookingError::Db(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
                BookingError::Db(DatabaseError::Conflict { .. }) => StatusCode::CONFLICT,
                BookingError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stable machine-readable code clients switch on
    fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELDS",
            Self::InvalidBody(_) => "MISSING_FIELDS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AdminExists => "CONFLICT",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { resource, .. } => not_found_code(resource),
            Self::Booking(e) => match e {
                BookingError::MissingTimeslot => "MISSING_FIELDS",
                BookingError::InvalidQuantity => "INVALID_QUANTITY",
                BookingError::InvalidTimeslot => "INVALID_TIMESLOT",
                BookingError::BlackedOut(_) => "RESOURCE_BLACKED_OUT",
                BookingError::SlotTaken { kind } => match kind {
                    ResourceKind::Room => "ROOM_CONFLICT",
                    ResourceKind::Lab => "LAB_CONFLICT",
                    ResourceKind::Equipment => "EQUIPMENT_UNAVAILABLE",
                },
                BookingError::EquipmentUnavailable { .. } => "EQUIPMENT_UNAVAILABLE",
                BookingError::InvalidStatus(_) => "INVALID_STATUS",
                BookingError::NotPermitted => "FORBIDDEN",
                BookingError::Db(DatabaseError::NotFound { resource, .. }) => {
                    not_found_code(resource)
                }
                BookingError::Db(DatabaseError::Conflict { .. }) => "CONFLICT",
                BookingError::Db(_) => "INTERNAL",
            },
            Self::Unknown(_) => "INTERNAL",
        }
    }
}

fn not_found_code(resource: &str) -> &'static str {
    match resource {
        "user" => "USER_NOT_FOUND",
        "resource" => "RESOURCE_NOT_FOUND",
        _ => "NOT_FOUND",
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        // Internal detail stays in the log, never in the response
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);

            let body = json!({
                "error": "INTERNAL",
                "message": "Internal server error",
            });

            return (status, Json(body)).into_response();
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AdminExists => Self::AdminExists,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<BookingError> for ServerError {
    fn from(value: BookingError) -> Self {
        Self::Booking(value)
    }
}
