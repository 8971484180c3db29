use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                   TEXT PRIMARY KEY,
            email                TEXT NOT NULL UNIQUE,
            password_hash        TEXT NOT NULL,
            name                 TEXT NOT NULL,
            phone                TEXT,
            profile_image_url    TEXT,
            date_of_birth        TEXT,
            gender               TEXT,
            institute            TEXT,
            onboarding_completed INTEGER NOT NULL DEFAULT 0,
            average_rating       REAL,
            total_ratings        INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            expires_at  TEXT NOT NULL,
            is_revoked  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vehicles (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users(id),
            make          TEXT NOT NULL,
            model         TEXT NOT NULL,
            year          INTEGER NOT NULL,
            color         TEXT,
            license_plate TEXT NOT NULL,
            capacity      INTEGER NOT NULL,
            image_url     TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS locations (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            name        TEXT NOT NULL,
            address     TEXT NOT NULL,
            latitude    REAL NOT NULL,
            longitude   REAL NOT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS people (
            id                TEXT PRIMARY KEY,
            user_id           TEXT NOT NULL REFERENCES users(id),
            name              TEXT NOT NULL,
            email             TEXT,
            phone             TEXT,
            profile_image_url TEXT,
            is_favorite       INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS trips (
            id              TEXT PRIMARY KEY,
            driver_id       TEXT NOT NULL REFERENCES users(id),
            vehicle_id      TEXT NOT NULL REFERENCES vehicles(id),
            start_latitude  REAL NOT NULL,
            start_longitude REAL NOT NULL,
            start_address   TEXT NOT NULL,
            end_latitude    REAL NOT NULL,
            end_longitude   REAL NOT NULL,
            end_address     TEXT NOT NULL,
            start_time      TEXT NOT NULL,
            end_time        TEXT,
            status          TEXT NOT NULL,
            available_seats INTEGER NOT NULL,
            price           REAL NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trips_driver
            ON trips(driver_id, status);
        CREATE INDEX IF NOT EXISTS idx_trips_status_time
            ON trips(status, start_time);

        CREATE TABLE IF NOT EXISTS ride_requests (
            id                TEXT PRIMARY KEY,
            trip_id           TEXT NOT NULL REFERENCES trips(id),
            passenger_id      TEXT NOT NULL REFERENCES users(id),
            pickup_latitude   REAL NOT NULL,
            pickup_longitude  REAL NOT NULL,
            pickup_address    TEXT NOT NULL,
            dropoff_latitude  REAL NOT NULL,
            dropoff_longitude REAL NOT NULL,
            dropoff_address   TEXT NOT NULL,
            status            TEXT NOT NULL,
            seats_requested   INTEGER NOT NULL,
            message           TEXT NOT NULL DEFAULT '',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_requests_trip
            ON ride_requests(trip_id, status);
        CREATE INDEX IF NOT EXISTS idx_requests_passenger
            ON ride_requests(passenger_id, status);

        CREATE TABLE IF NOT EXISTS ratings (
            id            TEXT PRIMARY KEY,
            trip_id       TEXT NOT NULL REFERENCES trips(id),
            rater_id      TEXT NOT NULL REFERENCES users(id),
            rated_user_id TEXT NOT NULL REFERENCES users(id),
            rating        INTEGER NOT NULL,
            comment       TEXT NOT NULL DEFAULT '',
            created_at    TEXT NOT NULL,
            UNIQUE(trip_id, rater_id, rated_user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_ratings_rated
            ON ratings(rated_user_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
