use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ridepool_api::middleware::require_auth;
use ridepool_api::{
    AppState, AppStateInner, auth, locations, people, ratings, ride_requests, trips, users,
    vehicles,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("RIDEPOOL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("RIDEPOOL_DB_PATH").unwrap_or_else(|_| "ridepool.db".into());
    let host = std::env::var("RIDEPOOL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("RIDEPOOL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let db = ridepool_db::Database::open(&PathBuf::from(&db_path))?;
    let state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/users/me", put(users::update_me))
        .route("/api/users/me/onboarding", post(users::complete_onboarding))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/vehicles", get(vehicles::list_vehicles).post(vehicles::add_vehicle))
        .route(
            "/api/vehicles/{id}",
            get(vehicles::get_vehicle)
                .put(vehicles::update_vehicle)
                .delete(vehicles::delete_vehicle),
        )
        .route("/api/locations", get(locations::list_locations).post(locations::add_location))
        .route(
            "/api/locations/{id}",
            get(locations::get_location)
                .put(locations::update_location)
                .delete(locations::delete_location),
        )
        .route("/api/locations/{id}/favorite", post(locations::toggle_favorite))
        .route("/api/people", get(people::list_people).post(people::add_person))
        .route(
            "/api/people/{id}",
            get(people::get_person).put(people::update_person).delete(people::delete_person),
        )
        .route("/api/people/{id}/favorite", post(people::toggle_favorite))
        .route("/api/trips", get(trips::list_trips).post(trips::create_trip))
        .route("/api/trips/search", get(trips::search_trips))
        .route("/api/trips/history", get(trips::trip_history))
        .route("/api/trips/stats", get(trips::trip_stats))
        .route("/api/trips/upcoming", get(trips::upcoming_trips))
        .route("/api/trips/{id}", get(trips::get_trip).put(trips::update_trip))
        .route("/api/trips/{id}/cancel", post(trips::cancel_trip))
        .route("/api/trips/{id}/start", post(trips::start_trip))
        .route("/api/trips/{id}/complete", post(trips::complete_trip))
        .route("/api/trips/{id}/participants", get(trips::trip_participants))
        .route(
            "/api/ride-requests",
            get(ride_requests::list_requests).post(ride_requests::create_request),
        )
        .route("/api/ride-requests/pending/{trip_id}", get(ride_requests::pending_for_trip))
        .route("/api/ride-requests/{id}", get(ride_requests::get_request))
        .route("/api/ride-requests/{id}/accept", post(ride_requests::accept_request))
        .route("/api/ride-requests/{id}/reject", post(ride_requests::reject_request))
        .route("/api/ride-requests/{id}/cancel", post(ride_requests::cancel_request))
        .route("/api/ratings", get(ratings::list_ratings).post(ratings::submit_rating))
        .route("/api/ratings/user/{user_id}", get(ratings::user_rating_summary))
        .route("/api/ratings/trip/{trip_id}", get(ratings::trip_ratings))
        .route("/api/ratings/{id}", get(ratings::get_rating))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Ridepool server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
