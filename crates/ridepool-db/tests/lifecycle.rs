use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use uuid::Uuid;

use ridepool_db::queries::{RequestAction, TripAction};
use ridepool_db::{Database, DbError};
use ridepool_types::api::{
    AddVehicleRequest, CreateRideRequest, CreateTripRequest, SubmitRatingRequest,
};
use ridepool_types::models::{RequestStatus, RideRequest, Trip, TripStatus, User};

fn seed_user(db: &Database, email: &str) -> Uuid {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: email.to_string(),
        phone: None,
        profile_image_url: None,
        date_of_birth: None,
        gender: None,
        institute: None,
        onboarding_completed: true,
        average_rating: None,
        total_ratings: 0,
        created_at: now,
        updated_at: now,
    };
    db.create_user(&user, "hash").unwrap();
    user.id
}

fn seed_vehicle(db: &Database, owner: Uuid) -> Uuid {
    let vehicle = db
        .add_vehicle(
            owner,
            &AddVehicleRequest {
                make: "Toyota".into(),
                model: "Corolla".into(),
                year: 2020,
                color: None,
                license_plate: "AB-123".into(),
                capacity: 4,
                image_url: None,
            },
        )
        .unwrap();
    vehicle.id
}

fn seed_trip(db: &Database, driver: Uuid, vehicle: Uuid, seats: u32) -> Trip {
    db.create_trip(
        driver,
        &CreateTripRequest {
            vehicle_id: vehicle,
            start_latitude: 48.85,
            start_longitude: 2.35,
            start_address: "Paris".into(),
            end_latitude: 48.58,
            end_longitude: 7.75,
            end_address: "Strasbourg".into(),
            start_time: Utc::now() + Duration::hours(2),
            end_time: None,
            available_seats: seats,
            price: 25.0,
            description: None,
        },
    )
    .unwrap()
}

fn request_ride(db: &Database, passenger: Uuid, trip_id: Uuid, seats: u32) -> RideRequest {
    db.create_request(
        passenger,
        &CreateRideRequest {
            trip_id,
            pickup_latitude: 48.85,
            pickup_longitude: 2.35,
            pickup_address: "Pickup".into(),
            dropoff_latitude: 48.58,
            dropoff_longitude: 7.75,
            dropoff_address: "Dropoff".into(),
            seats_requested: seats,
            message: None,
        },
    )
    .unwrap()
}

#[test]
fn accept_fails_once_capacity_is_committed() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);

    let a = seed_user(&db, "a@test");
    let b = seed_user(&db, "b@test");
    let req_a = request_ride(&db, a, trip.id, 2);
    let req_b = request_ride(&db, b, trip.id, 1);

    let accepted = db.decide_request(req_a.id, driver, RequestAction::Accept).unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);

    let err = db.decide_request(req_b.id, driver, RequestAction::Accept).unwrap_err();
    assert!(matches!(err, DbError::CapacityExceeded));
    assert_eq!(db.accepted_seats_for_trip(trip.id).unwrap(), 2);
}

#[test]
fn cancelling_an_accepted_request_releases_its_seats() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 1);

    let a = seed_user(&db, "a@test");
    let b = seed_user(&db, "b@test");
    let req_a = request_ride(&db, a, trip.id, 1);
    let req_b = request_ride(&db, b, trip.id, 1);

    db.decide_request(req_a.id, driver, RequestAction::Accept).unwrap();
    let err = db.decide_request(req_b.id, driver, RequestAction::Accept).unwrap_err();
    assert!(matches!(err, DbError::CapacityExceeded));

    db.cancel_request(req_a.id, a).unwrap();
    assert_eq!(db.accepted_seats_for_trip(trip.id).unwrap(), 0);

    let accepted = db.decide_request(req_b.id, driver, RequestAction::Accept).unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);
}

#[test]
fn only_the_trip_owner_may_decide_a_request() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);

    let passenger = seed_user(&db, "p@test");
    let intruder = seed_user(&db, "x@test");
    let request = request_ride(&db, passenger, trip.id, 1);

    let err = db
        .decide_request(request.id, intruder, RequestAction::Accept)
        .unwrap_err();
    assert!(matches!(err, DbError::NotOwner(_)));
}

#[test]
fn a_request_can_only_be_decided_while_pending() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);

    let passenger = seed_user(&db, "p@test");
    let request = request_ride(&db, passenger, trip.id, 1);
    db.decide_request(request.id, driver, RequestAction::Accept).unwrap();

    let err = db
        .decide_request(request.id, driver, RequestAction::Reject)
        .unwrap_err();
    match err {
        DbError::InvalidState { current, .. } => assert_eq!(current, "accepted"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn a_passenger_cannot_hold_two_active_requests_on_one_trip() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 4);

    let passenger = seed_user(&db, "p@test");
    let first = request_ride(&db, passenger, trip.id, 1);

    let err = db
        .create_request(
            passenger,
            &CreateRideRequest {
                trip_id: trip.id,
                pickup_latitude: 0.0,
                pickup_longitude: 0.0,
                pickup_address: "Pickup".into(),
                dropoff_latitude: 0.0,
                dropoff_longitude: 0.0,
                dropoff_address: "Dropoff".into(),
                seats_requested: 1,
                message: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, DbError::DuplicateRequest));

    // A terminal request no longer blocks a new one.
    db.cancel_request(first.id, passenger).unwrap();
    request_ride(&db, passenger, trip.id, 1);
}

#[test]
fn trip_transitions_follow_the_legal_chains() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);

    let trip = seed_trip(&db, driver, vehicle, 2);
    let err = db.transition_trip(trip.id, driver, TripAction::Complete).unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));

    let started = db.transition_trip(trip.id, driver, TripAction::Start).unwrap();
    assert_eq!(started.status, TripStatus::InProgress);
    let done = db.transition_trip(trip.id, driver, TripAction::Complete).unwrap();
    assert_eq!(done.status, TripStatus::Completed);

    // Terminal states never move again.
    let err = db.transition_trip(trip.id, driver, TripAction::Start).unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));
}

#[test]
fn cancelling_an_in_progress_trip_names_the_current_status() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);
    db.transition_trip(trip.id, driver, TripAction::Start).unwrap();

    let err = db.transition_trip(trip.id, driver, TripAction::Cancel).unwrap_err();
    assert!(err.to_string().contains("in_progress"), "got: {err}");
}

#[test]
fn requests_are_rejected_on_non_scheduled_trips() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);
    db.transition_trip(trip.id, driver, TripAction::Cancel).unwrap();

    let passenger = seed_user(&db, "p@test");
    let err = db
        .create_request(
            passenger,
            &CreateRideRequest {
                trip_id: trip.id,
                pickup_latitude: 0.0,
                pickup_longitude: 0.0,
                pickup_address: "Pickup".into(),
                dropoff_latitude: 0.0,
                dropoff_longitude: 0.0,
                dropoff_address: "Dropoff".into(),
                seats_requested: 1,
                message: None,
            },
        )
        .unwrap_err();
    match err {
        DbError::InvalidState { current, .. } => assert_eq!(current, "cancelled"),
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Drive a trip to `completed` with the given passengers accepted.
fn completed_trip(db: &Database, driver: Uuid, passengers: &[Uuid]) -> Trip {
    let vehicle = seed_vehicle(db, driver);
    let trip = seed_trip(db, driver, vehicle, passengers.len() as u32);
    for &p in passengers {
        let request = request_ride(db, p, trip.id, 1);
        db.decide_request(request.id, driver, RequestAction::Accept).unwrap();
    }
    db.transition_trip(trip.id, driver, TripAction::Start).unwrap();
    db.transition_trip(trip.id, driver, TripAction::Complete).unwrap()
}

#[test]
fn ratings_fold_into_the_average() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let p1 = seed_user(&db, "p1@test");
    let p2 = seed_user(&db, "p2@test");
    let p3 = seed_user(&db, "p3@test");
    let trip = completed_trip(&db, driver, &[p1, p2, p3]);

    for (rater, score) in [(p1, 5), (p2, 3), (p3, 4)] {
        db.submit_rating(
            rater,
            &SubmitRatingRequest {
                trip_id: trip.id,
                rated_user_id: driver,
                rating: score,
                comment: None,
            },
        )
        .unwrap();
    }

    let rated = db.get_user(driver).unwrap().unwrap();
    assert_eq!(rated.average_rating, Some(4.0));
    assert_eq!(rated.total_ratings, 3);
}

#[test]
fn the_same_pair_cannot_rate_twice_on_one_trip() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let passenger = seed_user(&db, "p@test");
    let trip = completed_trip(&db, driver, &[passenger]);

    let req = SubmitRatingRequest {
        trip_id: trip.id,
        rated_user_id: driver,
        rating: 5,
        comment: None,
    };
    db.submit_rating(passenger, &req).unwrap();
    let err = db.submit_rating(passenger, &req).unwrap_err();
    assert!(matches!(err, DbError::DuplicateRating));
}

#[test]
fn only_participants_may_rate() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let passenger = seed_user(&db, "p@test");
    let outsider = seed_user(&db, "x@test");
    let trip = completed_trip(&db, driver, &[passenger]);

    let err = db
        .submit_rating(
            outsider,
            &SubmitRatingRequest {
                trip_id: trip.id,
                rated_user_id: driver,
                rating: 5,
                comment: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, DbError::NotParticipant(_)));

    let err = db
        .submit_rating(
            driver,
            &SubmitRatingRequest {
                trip_id: trip.id,
                rated_user_id: outsider,
                rating: 5,
                comment: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, DbError::NotParticipant(_)));
}

#[test]
fn rating_requires_a_completed_trip() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 2);

    let err = db
        .submit_rating(
            driver,
            &SubmitRatingRequest {
                trip_id: trip.id,
                rated_user_id: driver,
                rating: 5,
                comment: None,
            },
        )
        .unwrap_err();
    match err {
        DbError::InvalidState { current, .. } => assert_eq!(current, "scheduled"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn concurrent_accepts_never_oversubscribe_the_last_seat() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let driver = seed_user(&db, "driver@test");
    let vehicle = seed_vehicle(&db, driver);
    let trip = seed_trip(&db, driver, vehicle, 1);

    let request_ids: Vec<Uuid> = (0..8)
        .map(|i| {
            let passenger = seed_user(&db, &format!("p{i}@test"));
            request_ride(&db, passenger, trip.id, 1).id
        })
        .collect();

    let handles: Vec<_> = request_ids
        .into_iter()
        .map(|request_id| {
            let db = db.clone();
            thread::spawn(move || db.decide_request(request_id, driver, RequestAction::Accept))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let capacity_failures = results
        .iter()
        .filter(|r| matches!(r, Err(DbError::CapacityExceeded)))
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(capacity_failures, 7);
    assert_eq!(db.accepted_seats_for_trip(trip.id).unwrap(), 1);
}
