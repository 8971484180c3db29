use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::Query, extract::State};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use ridepool_db::queries::TripAction;
use ridepool_db::DbError;
use ridepool_types::api::{
    CreateTripRequest, DriverTripCounts, HistoryEntry, HistoryPage, HistoryQuery, Pagination,
    PassengerInfo, PassengerRideCounts, Role, RoleQuery, SearchHit, SearchQuery, TripListQuery,
    TripParticipants, TripStats, UpcomingTrip, UpdateTripRequest,
};
use ridepool_types::models::{RequestStatus, RideRequest, Trip, TripStatus};

use crate::error::ApiError;
use crate::geo::{haversine_km, round2};
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_with};

const AVERAGE_SPEED_KMH: f64 = 40.0;

fn validate_trip_fields(available_seats: u32, price: f64) -> Result<(), ApiError> {
    if available_seats < 1 {
        return Err(ApiError::Validation(
            "available_seats must be at least 1".into(),
        ));
    }
    if price < 0.0 {
        return Err(ApiError::Validation("price cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<CreateTripRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_trip_fields(req.available_seats, req.price)?;
    if req.start_address.trim().is_empty() || req.end_address.trim().is_empty() {
        return Err(ApiError::Validation(
            "start_address and end_address are required".into(),
        ));
    }

    let db = state.clone();
    let trip = blocking(move || db.db.create_trip(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("trip", trip)))
}

/// With `is_driver` the listing narrows to the caller's own trips;
/// otherwise it is an open browse over the shared pool.
pub async fn list_trips(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<TripListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let driver = query.is_driver.then_some(user_id);
    let db = state.clone();
    let trips = blocking(move || db.db.list_trips(driver, &query)).await?;
    Ok(ok_with("trips", trips))
}

/// The radius post-filter applies only when the search gives all three
/// of latitude, longitude, and radius; otherwise the SQL-filtered set
/// is returned as-is.
fn search_origin(query: &SearchQuery) -> Option<(f64, f64, f64)> {
    match (query.near_latitude, query.near_longitude, query.radius_km) {
        (Some(lat), Some(lng), Some(radius)) => Some((lat, lng, radius)),
        _ => None,
    }
}

/// SQL filters first, then the optional radius post-filter against the
/// trip start coordinate.
pub async fn search_trips(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let origin = search_origin(&query);

    let db = state.clone();
    let trips = blocking(move || db.db.search_trips(&query)).await?;

    let hits: Vec<SearchHit> = trips
        .into_iter()
        .filter_map(|trip| match origin {
            Some((lat, lng, radius)) => {
                let distance = haversine_km(lat, lng, trip.start_latitude, trip.start_longitude);
                (distance <= radius).then(|| SearchHit {
                    trip,
                    distance_km: Some(round2(distance)),
                })
            }
            None => Some(SearchHit {
                trip,
                distance_km: None,
            }),
        })
        .collect();

    Ok(ok_with("trips", hits))
}

pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (trip, vehicle) = blocking(move || {
        let trip = db.db.get_trip(id)?.ok_or(DbError::NotFound("Trip"))?;
        let vehicle = db.db.get_vehicle(trip.vehicle_id, None)?;
        Ok((trip, vehicle))
    })
    .await?;

    let mut payload = json!(trip);
    payload["vehicle"] = json!(vehicle);
    Ok(ok_with("trip", payload))
}

pub async fn update_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTripRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(seats) = req.available_seats {
        validate_trip_fields(seats, req.price.unwrap_or(0.0))?;
    } else if let Some(price) = req.price {
        validate_trip_fields(1, price)?;
    }

    let db = state.clone();
    let trip = blocking(move || db.db.update_trip(id, user_id, &req)).await?;
    Ok(ok_with("trip", trip))
}

pub async fn cancel_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = blocking(move || db.db.transition_trip(id, user_id, TripAction::Cancel)).await?;
    Ok(ok_with("trip", trip))
}

pub async fn start_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = blocking(move || db.db.transition_trip(id, user_id, TripAction::Start)).await?;
    Ok(ok_with("trip", trip))
}

pub async fn complete_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let trip = blocking(move || db.db.transition_trip(id, user_id, TripAction::Complete)).await?;
    Ok(ok_with("trip", trip))
}

/// Driver plus confirmed passengers. Visible to the driver and to
/// anyone holding a request on the trip.
pub async fn trip_participants(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (driver, passengers) = blocking(move || {
        let trip = db.db.get_trip(id)?.ok_or(DbError::NotFound("Trip"))?;
        if trip.driver_id != user_id {
            let mine = db.db.requests_for_passenger(user_id)?;
            if !mine.iter().any(|r| r.trip_id == id) {
                return Err(DbError::NotParticipant(
                    "Not authorized to view trip participants",
                ));
            }
        }
        let driver = db
            .db
            .get_user_summary(trip.driver_id)?
            .ok_or(DbError::NotFound("User"))?;
        let passengers = db.db.accepted_passengers(id)?;
        Ok((driver, passengers))
    })
    .await?;

    let passengers = passengers
        .into_iter()
        .map(|(request, passenger)| PassengerInfo {
            id: passenger.id,
            name: passenger.name,
            profile_image_url: passenger.profile_image_url,
            pickup_address: request.pickup_address,
            dropoff_address: request.dropoff_address,
            seats: request.seats_requested,
            status: request.status,
        })
        .collect();

    Ok(ok_with("participants", TripParticipants { driver, passengers }))
}

const ALL_REQUEST_STATUSES: [RequestStatus; 5] = [
    RequestStatus::Pending,
    RequestStatus::Accepted,
    RequestStatus::Rejected,
    RequestStatus::Cancelled,
    RequestStatus::Completed,
];

/// Merged driver/passenger history, newest trips first, paginated.
pub async fn trip_history(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    // A status filter only applies to the side whose enum it parses as.
    let trip_status: Option<TripStatus> = query.status.as_deref().and_then(|s| s.parse().ok());
    let request_status: Option<RequestStatus> =
        query.status.as_deref().and_then(|s| s.parse().ok());
    let status_given = query.status.is_some();

    let include_driver = query.role != Role::Passenger && (!status_given || trip_status.is_some());
    let include_passenger =
        query.role != Role::Driver && (!status_given || request_status.is_some());

    let db = state.clone();
    let mut entries = blocking(move || {
        let mut entries: Vec<HistoryEntry> = Vec::new();

        if include_driver {
            let filter = TripListQuery {
                is_driver: true,
                status: trip_status,
                start_time_after: query.from_date,
                start_time_before: query.to_date,
            };
            for trip in db.db.list_trips(Some(user_id), &filter)? {
                let passengers = db.db.accepted_seats_for_trip(trip.id)?;
                entries.push(driver_entry(trip, passengers));
            }
        }

        if include_passenger {
            let statuses: Vec<RequestStatus> = match request_status {
                Some(s) => vec![s],
                None => ALL_REQUEST_STATUSES.to_vec(),
            };
            for (request, trip) in db.db.passenger_requests_with_trips(user_id, &statuses)? {
                if query.from_date.is_some_and(|from| trip.start_time < from)
                    || query.to_date.is_some_and(|to| trip.start_time > to)
                {
                    continue;
                }
                entries.push(passenger_entry(request, &trip));
            }
        }

        Ok(entries)
    })
    .await?;

    entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    let (trips, pagination) = paginate(entries, page, limit);
    Ok(ok_with("history", HistoryPage { trips, pagination }))
}

fn driver_entry(trip: Trip, passengers: u32) -> HistoryEntry {
    HistoryEntry {
        id: trip.id,
        ride_request_id: None,
        role: "driver",
        start_address: trip.start_address,
        end_address: trip.end_address,
        start_time: trip.start_time,
        status: trip.status.to_string(),
        passengers: Some(passengers),
        seats: None,
        price: trip.price,
        created_at: trip.created_at,
        // Completion never writes end_time, so the transition
        // timestamp is the one that carries the completion moment.
        completed_at: (trip.status == TripStatus::Completed).then_some(trip.updated_at),
    }
}

/// Passenger rows carry the request's own pickup/dropoff leg, not the
/// trip's full route.
fn passenger_entry(request: RideRequest, trip: &Trip) -> HistoryEntry {
    HistoryEntry {
        id: trip.id,
        ride_request_id: Some(request.id),
        role: "passenger",
        start_address: request.pickup_address,
        end_address: request.dropoff_address,
        start_time: trip.start_time,
        status: request.status.to_string(),
        passengers: None,
        seats: Some(request.seats_requested),
        price: trip.price,
        created_at: request.created_at,
        completed_at: (request.status == RequestStatus::Completed)
            .then_some(request.updated_at),
    }
}

/// 1-based pagination; `pages = ceil(total / limit)`. The offset is
/// computed in usize so an extreme `page` from the query string cannot
/// overflow u32.
fn paginate(entries: Vec<HistoryEntry>, page: u32, limit: u32) -> (Vec<HistoryEntry>, Pagination) {
    let total = entries.len();
    let pages = total.div_ceil(limit as usize) as u32;
    let start = (page as usize).saturating_sub(1).saturating_mul(limit as usize);
    let trips = entries
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .collect();
    (trips, Pagination { total, page, limit, pages })
}

pub async fn trip_stats(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let stats = blocking(move || {
        let trips = db.db.list_trips(Some(user_id), &TripListQuery::default())?;

        let mut as_driver = DriverTripCounts::default();
        let mut total_distance = 0.0;
        let mut total_earnings = 0.0;
        for trip in &trips {
            as_driver.total += 1;
            match trip.status {
                TripStatus::Scheduled => as_driver.scheduled += 1,
                TripStatus::InProgress => as_driver.in_progress += 1,
                TripStatus::Completed => as_driver.completed += 1,
                TripStatus::Cancelled => as_driver.cancelled += 1,
            }
            if trip.status == TripStatus::Completed {
                total_distance += haversine_km(
                    trip.start_latitude,
                    trip.start_longitude,
                    trip.end_latitude,
                    trip.end_longitude,
                );
                let seats = db.db.accepted_seats_for_trip(trip.id)?;
                total_earnings += trip.price * f64::from(seats);
            }
        }

        let mut as_passenger = PassengerRideCounts::default();
        let rides = db
            .db
            .passenger_requests_with_trips(user_id, &ALL_REQUEST_STATUSES)?;
        for (request, _) in &rides {
            as_passenger.total += 1;
            match request.status {
                RequestStatus::Pending => as_passenger.pending += 1,
                RequestStatus::Accepted => as_passenger.accepted += 1,
                RequestStatus::Completed => as_passenger.completed += 1,
                RequestStatus::Rejected => as_passenger.rejected += 1,
                RequestStatus::Cancelled => as_passenger.cancelled += 1,
            }
        }

        Ok(TripStats {
            trips_as_driver: as_driver,
            rides_as_passenger: as_passenger,
            total_distance_km: round2(total_distance),
            total_earnings: round2(total_earnings),
        })
    })
    .await?;

    Ok(ok_with("stats", stats))
}

/// Scheduled future trips where the caller drives or holds an accepted
/// seat, as enriched cards.
pub async fn upcoming_trips(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<RoleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let db = state.clone();
    let mut upcoming = blocking(move || {
        let mut cards: Vec<UpcomingTrip> = Vec::new();

        if query.role != Role::Passenger {
            let me = db
                .db
                .get_user_summary(user_id)?
                .ok_or(DbError::NotFound("User"))?;
            for trip in db.db.upcoming_driver_trips(user_id, now)? {
                let passengers = db.db.accepted_seats_for_trip(trip.id)?;
                cards.push(upcoming_card(&trip, &me.name, me.profile_image_url.clone(), passengers, true));
            }
        }

        if query.role != Role::Driver {
            for (_, trip) in
                db.db.passenger_requests_with_trips(user_id, &[RequestStatus::Accepted])?
            {
                if trip.status != TripStatus::Scheduled || trip.start_time <= now {
                    continue;
                }
                let passengers = db.db.accepted_seats_for_trip(trip.id)?;
                let driver = db
                    .db
                    .get_user_summary(trip.driver_id)?
                    .ok_or(DbError::NotFound("User"))?;
                cards.push(upcoming_card(
                    &trip,
                    &driver.name,
                    driver.profile_image_url,
                    passengers,
                    false,
                ));
            }
        }

        Ok(cards)
    })
    .await?;

    upcoming.sort_by_key(|card| card.start_time);
    Ok(ok_with("trips", upcoming))
}

fn upcoming_card(
    trip: &Trip,
    creator_name: &str,
    creator_image_url: Option<String>,
    passengers_count: u32,
    is_creator: bool,
) -> UpcomingTrip {
    let distance = round2(haversine_km(
        trip.start_latitude,
        trip.start_longitude,
        trip.end_latitude,
        trip.end_longitude,
    ));
    let duration = (distance / AVERAGE_SPEED_KMH * 60.0).round() as u32;
    UpcomingTrip {
        id: trip.id,
        source_address: trip.start_address.clone(),
        destination_address: trip.end_address.clone(),
        start_time: trip.start_time,
        cost: trip.price,
        seats: trip.available_seats,
        passengers_count,
        vehicle_id: trip.vehicle_id,
        creator_name: creator_name.to_string(),
        creator_image_url,
        distance,
        duration,
        is_creator,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn entry(n: i64) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            ride_request_id: None,
            role: "driver",
            start_address: "A".into(),
            end_address: "B".into(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(n),
            status: "completed".into(),
            passengers: Some(0),
            seats: None,
            price: 10.0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn pagination_splits_23_entries_into_3_pages() {
        let (first, meta) = paginate((0..23).map(entry).collect(), 1, 10);
        assert_eq!(first.len(), 10);
        assert_eq!(meta.total, 23);
        assert_eq!(meta.pages, 3);

        let (last, _) = paginate((0..23).map(entry).collect(), 3, 10);
        assert_eq!(last.len(), 3);
    }

    #[test]
    fn pagination_past_the_end_is_empty() {
        let entries: Vec<_> = (0..5).map(entry).collect();
        let (slice, meta) = paginate(entries, 4, 10);
        assert!(slice.is_empty());
        assert_eq!(meta.pages, 1);
    }

    #[test]
    fn pagination_survives_an_extreme_page_number() {
        let entries: Vec<_> = (0..5).map(entry).collect();
        let (slice, meta) = paginate(entries, u32::MAX, 100);
        assert!(slice.is_empty());
        assert_eq!(meta.total, 5);
    }

    #[test]
    fn search_origin_requires_all_three_parameters() {
        let with_radius = SearchQuery {
            near_latitude: Some(48.85),
            near_longitude: Some(2.35),
            radius_km: Some(5.0),
            ..Default::default()
        };
        assert_eq!(search_origin(&with_radius), Some((48.85, 2.35, 5.0)));

        // Coordinates without a radius leave the result set unfiltered.
        let without_radius = SearchQuery {
            near_latitude: Some(48.85),
            near_longitude: Some(2.35),
            ..Default::default()
        };
        assert_eq!(search_origin(&without_radius), None);
        assert_eq!(search_origin(&SearchQuery::default()), None);
    }

    fn fixture_trip(status: TripStatus) -> Trip {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Trip {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            start_latitude: 48.85,
            start_longitude: 2.35,
            start_address: "Paris".into(),
            end_latitude: 45.76,
            end_longitude: 4.84,
            end_address: "Lyon".into(),
            start_time: now,
            end_time: None,
            status,
            available_seats: 3,
            price: 20.0,
            created_at: now - chrono::Duration::days(1),
            updated_at: now + chrono::Duration::hours(5),
            description: String::new(),
        }
    }

    fn fixture_request(trip: &Trip) -> RideRequest {
        let now = Utc::now();
        RideRequest {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            passenger_id: Uuid::new_v4(),
            pickup_latitude: 48.8,
            pickup_longitude: 2.3,
            pickup_address: "Porte d'Orleans".into(),
            dropoff_latitude: 45.7,
            dropoff_longitude: 4.8,
            dropoff_address: "Gare Part-Dieu".into(),
            status: RequestStatus::Accepted,
            seats_requested: 2,
            message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn passenger_entries_carry_the_request_leg() {
        let trip = fixture_trip(TripStatus::Completed);
        let request = fixture_request(&trip);

        let row = passenger_entry(request, &trip);
        assert_eq!(row.role, "passenger");
        assert_eq!(row.start_address, "Porte d'Orleans");
        assert_eq!(row.end_address, "Gare Part-Dieu");
        assert_eq!(row.seats, Some(2));
    }

    #[test]
    fn completed_driver_entries_report_the_transition_time() {
        let trip = fixture_trip(TripStatus::Completed);
        let updated_at = trip.updated_at;
        let row = driver_entry(trip, 2);
        assert_eq!(row.completed_at, Some(updated_at));

        let row = driver_entry(fixture_trip(TripStatus::Scheduled), 0);
        assert_eq!(row.completed_at, None);
    }
}
