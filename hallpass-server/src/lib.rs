use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
};

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod bookings;
mod context;
mod docs;
mod errors;
mod notifications;
mod resources;
mod schemas;
mod serialized;
mod timeslots;

pub use context::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;

pub type Router = axum::Router<ServerContext>;

/// Assembles the full route tree for a campus instance
pub fn build_router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/bookings", bookings::router())
        .nest("/resources", resources::router())
        .nest("/timeslots", timeslots::router())
        .nest("/notifications", notifications::router());

    Router::new()
        .nest("/api", api_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the hallpass server
pub async fn run_server(context: ServerContext) {
    let port = env::var("HALLPASS_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let router = build_router(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, router.into_make_service())
        .await
        .expect("server runs");
}
