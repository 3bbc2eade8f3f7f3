use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use chrono::NaiveDate;
use hallpass_campus::{PrimaryKey, ResourceKind};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub username: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 2, max = 128))]
    pub display_name: String,
    #[validate(length(min = 2, max = 128))]
    pub username: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBookingSchema {
    pub resource_id: PrimaryKey,
    pub booking_date: NaiveDate,
    /// Required for rooms and labs
    pub timeslot_id: Option<PrimaryKey>,
    /// Only meaningful for equipment, defaults to 1
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
    #[validate(length(max = 512))]
    pub purpose: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateBookingSchema {
    pub booking_date: Option<NaiveDate>,
    pub timeslot_id: Option<PrimaryKey>,
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
    #[validate(length(max = 512))]
    pub purpose: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RescheduleSchema {
    pub booking_date: NaiveDate,
    /// Falls back to the original booking's timeslot when omitted
    pub timeslot_id: Option<PrimaryKey>,
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Copy, ToSchema, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKindSchema {
    Room,
    Lab,
    Equipment,
}

impl From<ResourceKindSchema> for ResourceKind {
    fn from(value: ResourceKindSchema) -> Self {
        match value {
            ResourceKindSchema::Room => Self::Room,
            ResourceKindSchema::Lab => Self::Lab,
            ResourceKindSchema::Equipment => Self::Equipment,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewResourceSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    pub kind: ResourceKindSchema,
    /// Seats, for rooms and labs
    #[validate(range(min = 1))]
    pub capacity: Option<i64>,
    /// Units in the pool, for equipment
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
    #[validate(length(max = 128))]
    pub location: Option<String>,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateResourceSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i64>,
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
    #[validate(length(max = 128))]
    pub location: Option<String>,
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBlackoutSchema {
    pub blackout_date: NaiveDate,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTimeslotSchema {
    #[validate(length(min = 1, max = 64))]
    pub label: String,
    #[validate(length(min = 1, max = 16))]
    pub start_time: String,
    #[validate(length(min = 1, max = 16))]
    pub end_time: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeslotToggleSchema {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// The date to check, as YYYY-MM-DD
    pub date: Option<NaiveDate>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| ServerError::InvalidBody("JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| ServerError::InvalidBody("Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
