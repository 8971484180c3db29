use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{RequestStatus, TripStatus};

// -- JWT Claims --

/// Canonical claims shape, shared by the token mint (auth handlers) and
/// the bearer middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub institute: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub institute: Option<String>,
    pub onboarding_completed: Option<bool>,
}

/// Trimmed profile used when embedding a user inside another payload
/// (trip participants, pending-request passengers, rating parties).
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// -- Vehicles --

#[derive(Debug, Deserialize)]
pub struct AddVehicleRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
    pub license_plate: String,
    pub capacity: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVehicleRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub capacity: Option<u32>,
    pub image_url: Option<String>,
}

// -- Locations / People --

#[derive(Debug, Deserialize)]
pub struct AddLocationRequest {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddPersonRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePersonRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_favorite: Option<bool>,
}

// -- Trips --

#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub vehicle_id: Uuid,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub start_address: String,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub end_address: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub available_seats: u32,
    pub price: f64,
    pub description: Option<String>,
}

/// Mutable-field subset; anything else sent by a client is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTripRequest {
    pub vehicle_id: Option<Uuid>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub start_address: Option<String>,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    pub end_address: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub available_seats: Option<u32>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TripListQuery {
    #[serde(default)]
    pub is_driver: bool,
    pub status: Option<TripStatus>,
    pub start_time_after: Option<DateTime<Utc>>,
    pub start_time_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub status: Option<TripStatus>,
    pub start_time_after: Option<DateTime<Utc>>,
    pub start_time_before: Option<DateTime<Utc>>,
    pub min_available_seats: Option<u32>,
    pub max_price: Option<f64>,
    pub near_latitude: Option<f64>,
    pub near_longitude: Option<f64>,
    pub radius_km: Option<f64>,
}

/// A search result: the trip plus its distance from the search origin,
/// present only when a radius filter was applied.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub trip: crate::models::Trip,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Passenger,
    #[default]
    Both,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub role: Role,
    pub status: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// One row of the merged driver/passenger history view.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_request_id: Option<Uuid>,
    pub role: &'static str,
    pub start_address: String,
    pub end_address: String,
    pub start_time: DateTime<Utc>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passengers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub trips: Vec<HistoryEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Serialize)]
pub struct DriverTripCounts {
    pub total: u32,
    pub scheduled: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
}

#[derive(Debug, Default, Serialize)]
pub struct PassengerRideCounts {
    pub total: u32,
    pub pending: u32,
    pub accepted: u32,
    pub completed: u32,
    pub rejected: u32,
    pub cancelled: u32,
}

#[derive(Debug, Serialize)]
pub struct TripStats {
    pub trips_as_driver: DriverTripCounts,
    pub rides_as_passenger: PassengerRideCounts,
    pub total_distance_km: f64,
    pub total_earnings: f64,
}

#[derive(Debug, Serialize)]
pub struct TripParticipants {
    pub driver: UserSummary,
    pub passengers: Vec<PassengerInfo>,
}

#[derive(Debug, Serialize)]
pub struct PassengerInfo {
    pub id: Uuid,
    pub name: String,
    pub profile_image_url: Option<String>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub seats: u32,
    pub status: RequestStatus,
}

/// Upcoming-trip card: a trip enriched with the driver, the committed
/// passenger count, and rough distance/duration estimates.
#[derive(Debug, Serialize)]
pub struct UpcomingTrip {
    pub id: Uuid,
    pub source_address: String,
    pub destination_address: String,
    pub start_time: DateTime<Utc>,
    pub cost: f64,
    pub seats: u32,
    pub passengers_count: u32,
    pub vehicle_id: Uuid,
    pub creator_name: String,
    pub creator_image_url: Option<String>,
    pub distance: f64,
    pub duration: u32,
    pub is_creator: bool,
}

// -- Ride requests --

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub trip_id: Uuid,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_address: String,
    pub seats_requested: u32,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    #[serde(default)]
    pub is_driver: bool,
}

// -- Ratings --

#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    pub trip_id: Uuid,
    pub rated_user_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingListQuery {
    #[serde(default)]
    pub as_rater: bool,
}
