use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json,
};
use chrono::NaiveDate;
use hallpass_campus::{NewBlackout, NewResource, PrimaryKey, UpdatedResource};

use crate::{
    auth::AdminSession,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        AvailabilityQuery, NewBlackoutSchema, NewResourceSchema, TimeslotToggleSchema,
        UpdateResourceSchema, ValidatedJson,
    },
    serialized::{Availability, Blackout, BlackoutResult, Resource, ResourceTimeslot, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/resources",
    tag = "resources",
    responses(
        (status = 200, body = Vec<Resource>)
    )
)]
async fn list_resources(State(context): State<ServerContext>) -> ServerResult<Json<Vec<Resource>>> {
    let resources = context.campus.resources.all().await?;

    Ok(Json(resources.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    tag = "resources",
    responses(
        (status = 200, body = Resource)
    )
)]
async fn resource(
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
) -> ServerResult<Json<Resource>> {
    let resource = context.campus.resources.by_id(resource_id).await?;

    Ok(Json(resource.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/resources",
    tag = "resources",
    request_body = NewResourceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Resource)
    )
)]
async fn create_resource(
    _session: AdminSession,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewResourceSchema>,
) -> ServerResult<(StatusCode, Json<Resource>)> {
    let resource = context
        .campus
        .resources
        .create(NewResource {
            name: body.name,
            kind: body.kind.into(),
            capacity: body.capacity,
            quantity: body.quantity,
            location: body.location,
            description: body.description,
            image_path: body.image_path,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(resource.to_serialized())))
}

#[utoipa::path(
    put,
    path = "/api/resources/{id}",
    tag = "resources",
    request_body = UpdateResourceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Resource)
    )
)]
async fn update_resource(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<UpdateResourceSchema>,
) -> ServerResult<Json<Resource>> {
    let resource = context
        .campus
        .resources
        .update(UpdatedResource {
            id: resource_id,
            name: body.name,
            capacity: body.capacity,
            quantity: body.quantity,
            location: body.location,
            description: body.description,
            image_path: body.image_path,
        })
        .await?;

    Ok(Json(resource.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/resources/{id}",
    tag = "resources",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Resource was deleted")
    )
)]
async fn delete_resource(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
) -> ServerResult<()> {
    context.campus.resources.delete(resource_id).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}/availability",
    tag = "resources",
    params(AvailabilityQuery),
    responses(
        (status = 200, body = Availability)
    )
)]
async fn resource_availability(
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
    Query(query): Query<AvailabilityQuery>,
) -> ServerResult<Json<Availability>> {
    let date = query.date.ok_or(ServerError::MissingField("date"))?;

    let availability = context
        .campus
        .bookings
        .availability(resource_id, date)
        .await?;

    Ok(Json(availability.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}/timeslots",
    tag = "resources",
    responses(
        (status = 200, body = Vec<ResourceTimeslot>)
    )
)]
async fn resource_timeslots(
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<ResourceTimeslot>>> {
    let offerings = context.campus.resources.offerings(resource_id).await?;

    Ok(Json(offerings.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/api/resources/{id}/timeslots/{timeslot_id}",
    tag = "resources",
    request_body = TimeslotToggleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Offering was updated")
    )
)]
async fn set_resource_timeslot(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path((resource_id, timeslot_id)): Path<(PrimaryKey, PrimaryKey)>,
    ValidatedJson(body): ValidatedJson<TimeslotToggleSchema>,
) -> ServerResult<()> {
    context
        .campus
        .resources
        .set_offering(resource_id, timeslot_id, body.is_active)
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/resources/{id}/blackouts",
    tag = "resources",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Blackout>)
    )
)]
async fn list_blackouts(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<Blackout>>> {
    let blackouts = context.campus.resources.blackouts(resource_id).await?;

    Ok(Json(blackouts.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/resources/{id}/blackouts",
    tag = "resources",
    request_body = NewBlackoutSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = BlackoutResult)
    )
)]
async fn add_blackout(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path(resource_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<NewBlackoutSchema>,
) -> ServerResult<(StatusCode, Json<BlackoutResult>)> {
    let application = context
        .campus
        .resources
        .add_blackout(NewBlackout {
            resource_id,
            blackout_date: body.blackout_date,
            reason: body.reason,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(application.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/api/resources/{id}/blackouts/{date}",
    tag = "resources",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Blackout was removed")
    )
)]
async fn remove_blackout(
    _session: AdminSession,
    State(context): State<ServerContext>,
    Path((resource_id, date)): Path<(PrimaryKey, NaiveDate)>,
) -> ServerResult<()> {
    context
        .campus
        .resources
        .remove_blackout(resource_id, date)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_resources))
        .route("/", post(create_resource))
        .route("/:id", get(resource))
        .route("/:id", put(update_resource))
        .route("/:id", delete(delete_resource))
        .route("/:id/availability", get(resource_availability))
        .route("/:id/timeslots", get(resource_timeslots))
        .route("/:id/timeslots/:timeslot_id", put(set_resource_timeslot))
        .route("/:id/blackouts", get(list_blackouts))
        .route("/:id/blackouts", post(add_blackout))
        .route("/:id/blackouts/:date", delete(remove_blackout))
}
