use chrono::{Duration, Utc};
use uuid::Uuid;

use ridepool_db::{Database, DbError};
use ridepool_types::api::{
    AddLocationRequest, AddPersonRequest, AddVehicleRequest, CreateTripRequest, SearchQuery,
    TripListQuery, UpdateTripRequest, UpdateUserRequest, UpdateVehicleRequest,
};
use ridepool_types::models::{TripStatus, User};

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
        onboarding_completed: false,
        average_rating: None,
        total_ratings: 0,
        created_at: now,
        updated_at: now,
    };
    db.create_user(&user, "hash").unwrap();
    user.id
}

fn vehicle_request() -> AddVehicleRequest {
    AddVehicleRequest {
        make: "Renault".into(),
        model: "Clio".into(),
        year: 2019,
        color: Some("red".into()),
        license_plate: "XY-987".into(),
        capacity: 4,
        image_url: None,
    }
}

fn trip_request(vehicle_id: Uuid) -> CreateTripRequest {
    CreateTripRequest {
        vehicle_id,
        start_latitude: 45.76,
        start_longitude: 4.84,
        start_address: "Lyon".into(),
        end_latitude: 43.3,
        end_longitude: 5.37,
        end_address: "Marseille".into(),
        start_time: Utc::now() + Duration::hours(3),
        end_time: None,
        available_seats: 3,
        price: 15.0,
        description: None,
    }
}

#[test]
fn vehicles_are_owner_scoped() {
    let db = Database::open_in_memory().unwrap();
    let owner = seed_user(&db, "owner@test");
    let other = seed_user(&db, "other@test");

    let vehicle = db.add_vehicle(owner, &vehicle_request()).unwrap();
    assert_eq!(db.list_vehicles(owner).unwrap().len(), 1);
    assert!(db.list_vehicles(other).unwrap().is_empty());

    let err = db
        .update_vehicle(
            vehicle.id,
            other,
            &UpdateVehicleRequest {
                make: None,
                model: None,
                year: None,
                color: None,
                license_plate: None,
                capacity: Some(2),
                image_url: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, DbError::NotOwner(_)));

    let updated = db
        .update_vehicle(
            vehicle.id,
            owner,
            &UpdateVehicleRequest {
                make: None,
                model: None,
                year: None,
                color: None,
                license_plate: None,
                capacity: Some(2),
                image_url: None,
            },
        )
        .unwrap();
    assert_eq!(updated.capacity, 2);

    let err = db.delete_vehicle(vehicle.id, other).unwrap_err();
    assert!(matches!(err, DbError::NotOwner(_)));
    db.delete_vehicle(vehicle.id, owner).unwrap();
    assert!(db.get_vehicle(vehicle.id, None).unwrap().is_none());
}

#[test]
fn favorite_toggle_flips_the_flag() {
    let db = Database::open_in_memory().unwrap();
    let owner = seed_user(&db, "owner@test");

    let location = db
        .add_location(
            owner,
            &AddLocationRequest {
                name: "Home".into(),
                address: "1 rue de la Paix".into(),
                latitude: 48.87,
                longitude: 2.33,
                is_favorite: false,
            },
        )
        .unwrap();
    assert!(!location.is_favorite);

    let toggled = db.toggle_location_favorite(location.id, owner).unwrap();
    assert!(toggled.is_favorite);
    let toggled = db.toggle_location_favorite(location.id, owner).unwrap();
    assert!(!toggled.is_favorite);
}

#[test]
fn deleting_a_foreign_person_fails() {
    let db = Database::open_in_memory().unwrap();
    let owner = seed_user(&db, "owner@test");
    let other = seed_user(&db, "other@test");

    let person = db
        .add_person(
            owner,
            &AddPersonRequest {
                name: "Alex".into(),
                email: None,
                phone: None,
                profile_image_url: None,
                is_favorite: false,
            },
        )
        .unwrap();

    let err = db.delete_person(person.id, other).unwrap_err();
    assert!(matches!(err, DbError::NotOwner(_)));
    assert!(db.get_person(person.id, Some(owner)).unwrap().is_some());
}

#[test]
fn profile_updates_apply_only_the_sent_fields() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_user(&db, "user@test");

    let updated = db
        .update_user(
            id,
            &UpdateUserRequest {
                name: Some("New Name".into()),
                phone: Some("0600000000".into()),
                profile_image_url: None,
                date_of_birth: None,
                gender: None,
                institute: None,
                onboarding_completed: None,
            },
        )
        .unwrap();
    assert_eq!(updated.name, "New Name");
    assert_eq!(updated.phone.as_deref(), Some("0600000000"));
    assert_eq!(updated.email, "user@test");
    assert!(!updated.onboarding_completed);

    db.complete_onboarding(id).unwrap();
    assert!(db.get_user(id).unwrap().unwrap().onboarding_completed);
}

#[test]
fn refresh_tokens_are_revoked_not_deleted() {
    let db = Database::open_in_memory().unwrap();
    let id = seed_user(&db, "user@test");

    db.store_refresh_token("tok-1", id, Utc::now() + Duration::days(30)).unwrap();
    let found = db.find_refresh_token("tok-1").unwrap().unwrap();
    assert_eq!(found.user_id, id);
    assert!(!found.is_revoked);

    assert!(db.revoke_refresh_token("tok-1").unwrap());
    let found = db.find_refresh_token("tok-1").unwrap().unwrap();
    assert!(found.is_revoked);

    // Unknown tokens report false so the caller can 400 them.
    assert!(!db.revoke_refresh_token("never-issued").unwrap());
}

#[test]
fn trips_are_only_editable_while_scheduled() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = db.add_vehicle(driver, &vehicle_request()).unwrap();
    let trip = db.create_trip(driver, &trip_request(vehicle.id)).unwrap();

    let updated = db
        .update_trip(
            trip.id,
            driver,
            &UpdateTripRequest {
                price: Some(20.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.price, 20.0);

    db.transition_trip(trip.id, driver, ridepool_db::queries::TripAction::Start).unwrap();
    let err = db
        .update_trip(
            trip.id,
            driver,
            &UpdateTripRequest {
                price: Some(30.0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));
}

#[test]
fn trips_require_an_owned_vehicle() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let other = seed_user(&db, "other@test");
    let vehicle = db.add_vehicle(other, &vehicle_request()).unwrap();

    let err = db.create_trip(driver, &trip_request(vehicle.id)).unwrap_err();
    assert!(matches!(err, DbError::NotOwner(_)));
}

#[test]
fn listing_filters_by_driver_and_status() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = db.add_vehicle(driver, &vehicle_request()).unwrap();

    let kept = db.create_trip(driver, &trip_request(vehicle.id)).unwrap();
    let cancelled = db.create_trip(driver, &trip_request(vehicle.id)).unwrap();
    db.transition_trip(cancelled.id, driver, ridepool_db::queries::TripAction::Cancel).unwrap();

    let scheduled = db
        .list_trips(
            Some(driver),
            &TripListQuery {
                status: Some(TripStatus::Scheduled),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, kept.id);

    let all = db.list_trips(Some(driver), &TripListQuery::default()).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn search_filters_on_seats_and_price() {
    let db = Database::open_in_memory().unwrap();
    let driver = seed_user(&db, "driver@test");
    let vehicle = db.add_vehicle(driver, &vehicle_request()).unwrap();

    let cheap = db.create_trip(driver, &trip_request(vehicle.id)).unwrap();
    let mut pricey_req = trip_request(vehicle.id);
    pricey_req.price = 80.0;
    pricey_req.available_seats = 1;
    db.create_trip(driver, &pricey_req).unwrap();

    let hits = db
        .search_trips(&SearchQuery {
            max_price: Some(50.0),
            min_available_seats: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, cheap.id);
}
