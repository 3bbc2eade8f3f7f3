use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json,
};
use hallpass_campus::{NewBooking, PrimaryKey, RescheduledBooking, UpdatedBooking};

use crate::{
    auth::{AdminSession, Session},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        AvailabilityQuery, NewBookingSchema, RescheduleSchema, UpdateBookingSchema, ValidatedJson,
    },
    serialized::{Availability, Booking, BookingStats, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "bookings",
    request_body = NewBookingSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Booking)
    )
)]
async fn create_booking(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewBookingSchema>,
) -> ServerResult<(StatusCode, Json<Booking>)> {
    let booking = context
        .campus
        .bookings
        .create(NewBooking {
            user_id: session.user().id,
            resource_id: body.resource_id,
            booking_date: body.booking_date,
            timeslot_id: body.timeslot_id,
            quantity: body.quantity,
            purpose: body.purpose,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/api/bookings",
    tag = "bookings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Booking>)
    )
)]
async fn list_bookings(
    _session: AdminSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Booking>>> {
    let bookings = context.campus.bookings.list_all().await?;

    Ok(Json(bookings.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/bookings/mine",
    tag = "bookings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Booking>)
    )
)]
async fn my_bookings(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Booking>>> {
    let bookings = context.campus.bookings.for_user(session.user().id).await?;

    Ok(Json(bookings.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/bookings/stats",
    tag = "bookings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BookingStats)
    )
)]
async fn booking_stats(
    _session: AdminSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<BookingStats>> {
    let stats = context.campus.bookings.stats().await?;

    Ok(Json(stats.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/bookings/availability/{resource_id}",
    tag = "bookings",
    params(AvailabilityQuery),
    responses(
        (status = 200, body = Availability)
    )
)]
async fn availability(
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
    put,
    path = "/api/bookings/{id}",
    tag = "bookings",
    request_body = UpdateBookingSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Booking)
    )
)]
async fn update_booking(
    session: Session,
    State(context): State<ServerContext>,
    Path(booking_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<UpdateBookingSchema>,
) -> ServerResult<Json<Booking>> {
    let caller = session.user();

    let booking = context
        .campus
        .bookings
        .update(
            &caller,
            UpdatedBooking {
                id: booking_id,
                booking_date: body.booking_date,
                timeslot_id: body.timeslot_id,
                quantity: body.quantity,
                purpose: body.purpose,
            },
        )
        .await?;

    Ok(Json(booking.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/reschedule",
    tag = "bookings",
    request_body = RescheduleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Booking)
    )
)]
async fn reschedule_booking(
    session: Session,
    State(context): State<ServerContext>,
    Path(booking_id): Path<PrimaryKey>,
    ValidatedJson(body): ValidatedJson<RescheduleSchema>,
) -> ServerResult<(StatusCode, Json<Booking>)> {
    let caller = session.user();

    let booking = context
        .campus
        .bookings
        .reschedule(
            &caller,
            RescheduledBooking {
                id: booking_id,
                booking_date: body.booking_date,
                timeslot_id: body.timeslot_id,
                quantity: body.quantity,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking.to_serialized())))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/cancel",
    tag = "bookings",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Booking)
    )
)]
async fn cancel_booking(
    session: Session,
    State(context): State<ServerContext>,
    Path(booking_id): Path<PrimaryKey>,
) -> ServerResult<Json<Booking>> {
    let caller = session.user();
    let booking = context.campus.bookings.cancel(&caller, booking_id).await?;

    Ok(Json(booking.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking))
        .route("/", get(list_bookings))
        .route("/mine", get(my_bookings))
        .route("/stats", get(booking_stats))
        .route("/availability/:resource_id", get(availability))
        .route("/:id", put(update_booking))
        .route("/:id/reschedule", post(reschedule_booking))
        .route("/:id/cancel", post(cancel_booking))
}
