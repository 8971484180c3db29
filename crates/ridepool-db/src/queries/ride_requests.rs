use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::{CreateRideRequest, UserSummary};
use ridepool_types::models::{RequestStatus, RideRequest, Trip, TripStatus};

use crate::queries::trips::{accepted_seats, query_trip};
use crate::queries::users::query_user_summary;
use crate::queries::{status_col, uuid_col};
use crate::{Database, DbError, Result};

const REQUEST_COLUMNS: &str = "id, trip_id, passenger_id, pickup_latitude, pickup_longitude, \
     pickup_address, dropoff_latitude, dropoff_longitude, dropoff_address, status, \
     seats_requested, message, created_at, updated_at";

fn request_from_row(row: &Row) -> rusqlite::Result<RideRequest> {
    Ok(RideRequest {
        id: uuid_col(row, 0)?,
        trip_id: uuid_col(row, 1)?,
        passenger_id: uuid_col(row, 2)?,
        pickup_latitude: row.get(3)?,
        pickup_longitude: row.get(4)?,
        pickup_address: row.get(5)?,
        dropoff_latitude: row.get(6)?,
        dropoff_longitude: row.get(7)?,
        dropoff_address: row.get(8)?,
        status: status_col(row, 9)?,
        seats_requested: row.get(10)?,
        message: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn query_request(conn: &Connection, id: Uuid) -> Result<Option<RideRequest>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {REQUEST_COLUMNS} FROM ride_requests WHERE id = ?1"))?;
    let request = stmt.query_row([id.to_string()], request_from_row).optional()?;
    Ok(request)
}

/// The two driver-side verdicts on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
}

impl Database {
    /// Create a pending request against a scheduled trip. The trip
    /// check, the duplicate check, and the insert run in one
    /// transaction, so an active duplicate can never be raced in.
    pub fn create_request(&self, passenger_id: Uuid, req: &CreateRideRequest) -> Result<RideRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let trip = query_trip(&tx, req.trip_id)?.ok_or(DbError::NotFound("Trip"))?;

            if trip.status != TripStatus::Scheduled {
                return Err(DbError::InvalidState {
                    message: "Cannot request a ride for a trip with status",
                    current: trip.status.to_string(),
                });
            }

            let active: u32 = tx.query_row(
                "SELECT COUNT(*) FROM ride_requests WHERE trip_id = ?1 AND passenger_id = ?2 \
                 AND status IN ('pending', 'accepted')",
                params![req.trip_id.to_string(), passenger_id.to_string()],
                |row| row.get(0),
            )?;
            if active > 0 {
                return Err(DbError::DuplicateRequest);
            }

            // Early capacity screen against the trip's total; the real
            // commitment check happens at accept time.
            if req.seats_requested > trip.available_seats {
                return Err(DbError::CapacityExceeded);
            }

            let now = Utc::now();
            let request = RideRequest {
                id: Uuid::new_v4(),
                trip_id: req.trip_id,
                passenger_id,
                pickup_latitude: req.pickup_latitude,
                pickup_longitude: req.pickup_longitude,
                pickup_address: req.pickup_address.clone(),
                dropoff_latitude: req.dropoff_latitude,
                dropoff_longitude: req.dropoff_longitude,
                dropoff_address: req.dropoff_address.clone(),
                status: RequestStatus::Pending,
                seats_requested: req.seats_requested,
                message: req.message.clone().unwrap_or_default(),
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                &format!("INSERT INTO ride_requests ({REQUEST_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
                params![
                    request.id.to_string(),
                    request.trip_id.to_string(),
                    request.passenger_id.to_string(),
                    request.pickup_latitude,
                    request.pickup_longitude,
                    request.pickup_address,
                    request.dropoff_latitude,
                    request.dropoff_longitude,
                    request.dropoff_address,
                    request.status.as_str(),
                    request.seats_requested,
                    request.message,
                    request.created_at,
                    request.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(request)
        })
    }

    pub fn get_request(&self, id: Uuid) -> Result<Option<RideRequest>> {
        self.with_conn(|conn| query_request(conn, id))
    }

    /// Driver verdict on a pending request. For an accept, the seat sum
    /// is recomputed and checked against capacity inside the same
    /// transaction that flips the status, so two concurrent accepts can
    /// never jointly oversubscribe the trip.
    pub fn decide_request(
        &self,
        id: Uuid,
        driver_id: Uuid,
        action: RequestAction,
    ) -> Result<RideRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut request = query_request(&tx, id)?.ok_or(DbError::NotFound("Ride request"))?;
            let trip = query_trip(&tx, request.trip_id)?.ok_or(DbError::NotFound("Trip"))?;

            if trip.driver_id != driver_id {
                return Err(DbError::NotOwner("Not authorized to update this ride request"));
            }
            if request.status != RequestStatus::Pending {
                return Err(DbError::InvalidState {
                    message: "Cannot update ride request with status",
                    current: request.status.to_string(),
                });
            }

            request.status = match action {
                RequestAction::Accept => {
                    let taken = accepted_seats(&tx, trip.id)?;
                    if taken + request.seats_requested > trip.available_seats {
                        return Err(DbError::CapacityExceeded);
                    }
                    RequestStatus::Accepted
                }
                RequestAction::Reject => RequestStatus::Rejected,
            };
            request.updated_at = Utc::now();

            tx.execute(
                "UPDATE ride_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![request.status.as_str(), request.updated_at, id.to_string()],
            )?;
            tx.commit()?;
            Ok(request)
        })
    }

    /// Passenger withdrawal. Allowed from either active state; a
    /// cancelled accepted request releases its seats immediately
    /// because capacity is derived from the accepted sum.
    pub fn cancel_request(&self, id: Uuid, passenger_id: Uuid) -> Result<RideRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut request = query_request(&tx, id)?.ok_or(DbError::NotFound("Ride request"))?;

            if request.passenger_id != passenger_id {
                return Err(DbError::NotOwner("Not authorized to update this ride request"));
            }
            if !request.status.is_active() {
                return Err(DbError::InvalidState {
                    message: "Cannot cancel ride request with status",
                    current: request.status.to_string(),
                });
            }

            request.status = RequestStatus::Cancelled;
            request.updated_at = Utc::now();

            tx.execute(
                "UPDATE ride_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![request.status.as_str(), request.updated_at, id.to_string()],
            )?;
            tx.commit()?;
            Ok(request)
        })
    }

    pub fn requests_for_passenger(&self, passenger_id: Uuid) -> Result<Vec<RideRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM ride_requests WHERE passenger_id = ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let requests = stmt
                .query_map([passenger_id.to_string()], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }

    /// Every request against any trip this driver owns.
    pub fn requests_for_driver(&self, driver_id: Uuid) -> Result<Vec<RideRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.trip_id, r.passenger_id, r.pickup_latitude, r.pickup_longitude, \
                 r.pickup_address, r.dropoff_latitude, r.dropoff_longitude, r.dropoff_address, \
                 r.status, r.seats_requested, r.message, r.created_at, r.updated_at \
                 FROM ride_requests r JOIN trips t ON t.id = r.trip_id \
                 WHERE t.driver_id = ?1 ORDER BY r.created_at DESC",
            )?;
            let requests = stmt
                .query_map([driver_id.to_string()], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }

    /// Pending requests for one trip, each with its passenger profile.
    /// Driver-only view.
    pub fn pending_requests_for_trip(
        &self,
        trip_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Vec<(RideRequest, UserSummary)>> {
        self.with_conn(|conn| {
            let trip = query_trip(conn, trip_id)?.ok_or(DbError::NotFound("Trip"))?;
            if trip.driver_id != driver_id {
                return Err(DbError::NotOwner("Not authorized"));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM ride_requests \
                 WHERE trip_id = ?1 AND status = 'pending' ORDER BY created_at"
            ))?;
            let requests = stmt
                .query_map([trip_id.to_string()], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut enriched = Vec::with_capacity(requests.len());
            for request in requests {
                let passenger = query_user_summary(conn, request.passenger_id)?
                    .ok_or(DbError::NotFound("User"))?;
                enriched.push((request, passenger));
            }
            Ok(enriched)
        })
    }

    /// Confirmed passengers of a trip (accepted or completed), with
    /// their profiles. Feeds the participants view.
    pub fn accepted_passengers(&self, trip_id: Uuid) -> Result<Vec<(RideRequest, UserSummary)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM ride_requests \
                 WHERE trip_id = ?1 AND status IN ('accepted', 'completed') ORDER BY created_at"
            ))?;
            let requests = stmt
                .query_map([trip_id.to_string()], request_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut enriched = Vec::with_capacity(requests.len());
            for request in requests {
                let passenger = query_user_summary(conn, request.passenger_id)?
                    .ok_or(DbError::NotFound("User"))?;
                enriched.push((request, passenger));
            }
            Ok(enriched)
        })
    }

    /// A passenger's requests joined with their trips, filtered to the
    /// given statuses. Feeds history, stats, and upcoming views.
    pub fn passenger_requests_with_trips(
        &self,
        passenger_id: Uuid,
        statuses: &[RequestStatus],
    ) -> Result<Vec<(RideRequest, Trip)>> {
        self.with_conn(|conn| {
            let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "SELECT r.id, r.trip_id, r.passenger_id, r.pickup_latitude, r.pickup_longitude, \
                 r.pickup_address, r.dropoff_latitude, r.dropoff_longitude, r.dropoff_address, \
                 r.status, r.seats_requested, r.message, r.created_at, r.updated_at, \
                 t.id, t.driver_id, t.vehicle_id, t.start_latitude, t.start_longitude, \
                 t.start_address, t.end_latitude, t.end_longitude, t.end_address, t.start_time, \
                 t.end_time, t.status, t.available_seats, t.price, t.description, t.created_at, \
                 t.updated_at \
                 FROM ride_requests r JOIN trips t ON t.id = r.trip_id \
                 WHERE r.passenger_id = ? AND r.status IN ({placeholders}) \
                 ORDER BY t.start_time"
            );

            let mut args: Vec<&dyn rusqlite::types::ToSql> = vec![];
            let passenger = passenger_id.to_string();
            args.push(&passenger);
            let status_strs: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            for s in &status_strs {
                args.push(s);
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(args.as_slice(), |row| {
                    let request = request_from_row(row)?;
                    let trip = trip_offset_from_row(row)?;
                    Ok((request, trip))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

/// Trip columns starting at index 14 of a joined request+trip row.
fn trip_offset_from_row(row: &Row) -> rusqlite::Result<Trip> {
    Ok(Trip {
        id: uuid_col(row, 14)?,
        driver_id: uuid_col(row, 15)?,
        vehicle_id: uuid_col(row, 16)?,
        start_latitude: row.get(17)?,
        start_longitude: row.get(18)?,
        start_address: row.get(19)?,
        end_latitude: row.get(20)?,
        end_longitude: row.get(21)?,
        end_address: row.get(22)?,
        start_time: row.get(23)?,
        end_time: row.get(24)?,
        status: status_col(row, 25)?,
        available_seats: row.get(26)?,
        price: row.get(27)?,
        description: row.get(28)?,
        created_at: row.get(29)?,
        updated_at: row.get(30)?,
    })
}
