use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json,
};
use hallpass_campus::NewTimeslot;

use crate::{
    auth::AdminSession,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewTimeslotSchema, ValidatedJson},
    serialized::{Timeslot, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/timeslots",
    tag = "timeslots",
    responses(
        (status = 200, body = Vec<Timeslot>)
    )
)]
async fn list_timeslots(State(context): State<ServerContext>) -> ServerResult<Json<Vec<Timeslot>>> {
    let timeslots = context.campus.resources.timeslot_catalog().await?;

    Ok(Json(timeslots.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/timeslots",
    tag = "timeslots",
    request_body = NewTimeslotSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Timeslot)
    )
)]
async fn create_timeslot(
    _session: AdminSession,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewTimeslotSchema>,
) -> ServerResult<(StatusCode, Json<Timeslot>)> {
    let timeslot = context
        .campus
        .resources
        .add_timeslot(NewTimeslot {
            label: body.label,
            start_time: body.start_time,
            end_time: body.end_time,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(timeslot.to_serialized())))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_timeslots))
        .route("/", post(create_timeslot))
}
