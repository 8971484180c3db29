use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::{AddVehicleRequest, UpdateVehicleRequest};
use ridepool_types::models::Vehicle;

use crate::queries::uuid_col;
use crate::{Database, DbError, Result};

const VEHICLE_COLUMNS: &str =
    "id, user_id, make, model, year, color, license_plate, capacity, image_url, \
     created_at, updated_at";

fn vehicle_from_row(row: &Row) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        year: row.get(4)?,
        color: row.get(5)?,
        license_plate: row.get(6)?,
        capacity: row.get(7)?,
        image_url: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Lookup scoped to an owner when one is given.
pub(crate) fn query_vehicle(
    conn: &Connection,
    id: Uuid,
    owner: Option<Uuid>,
) -> Result<Option<Vehicle>> {
    let vehicle = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1 AND user_id = ?2"
            ))?
            .query_row(params![id.to_string(), user_id.to_string()], vehicle_from_row)
            .optional()?,
        None => conn
            .prepare(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"))?
            .query_row([id.to_string()], vehicle_from_row)
            .optional()?,
    };
    Ok(vehicle)
}

impl Database {
    pub fn list_vehicles(&self, user_id: Uuid) -> Result<Vec<Vehicle>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE user_id = ?1 ORDER BY created_at"
            ))?;
            let vehicles = stmt
                .query_map([user_id.to_string()], vehicle_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(vehicles)
        })
    }

    pub fn get_vehicle(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Vehicle>> {
        self.with_conn(|conn| query_vehicle(conn, id, owner))
    }

    pub fn add_vehicle(&self, user_id: Uuid, req: &AddVehicleRequest) -> Result<Vehicle> {
        let now = Utc::now();
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            user_id,
            make: req.make.clone(),
            model: req.model.clone(),
            year: req.year,
            color: req.color.clone(),
            license_plate: req.license_plate.clone(),
            capacity: req.capacity,
            image_url: req.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vehicles (id, user_id, make, model, year, color, license_plate, \
                 capacity, image_url, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    vehicle.id.to_string(),
                    vehicle.user_id.to_string(),
                    vehicle.make,
                    vehicle.model,
                    vehicle.year,
                    vehicle.color,
                    vehicle.license_plate,
                    vehicle.capacity,
                    vehicle.image_url,
                    vehicle.created_at,
                    vehicle.updated_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(vehicle)
    }

    pub fn update_vehicle(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &UpdateVehicleRequest,
    ) -> Result<Vehicle> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut vehicle = query_vehicle(&tx, id, Some(user_id))?
                .ok_or(DbError::NotOwner("Vehicle not found or does not belong to user"))?;

            if let Some(make) = &req.make {
                vehicle.make = make.clone();
            }
            if let Some(model) = &req.model {
                vehicle.model = model.clone();
            }
            if let Some(year) = req.year {
                vehicle.year = year;
            }
            if let Some(color) = &req.color {
                vehicle.color = Some(color.clone());
            }
            if let Some(plate) = &req.license_plate {
                vehicle.license_plate = plate.clone();
            }
            if let Some(capacity) = req.capacity {
                vehicle.capacity = capacity;
            }
            if let Some(url) = &req.image_url {
                vehicle.image_url = Some(url.clone());
            }
            vehicle.updated_at = Utc::now();

            tx.execute(
                "UPDATE vehicles SET make = ?1, model = ?2, year = ?3, color = ?4, \
                 license_plate = ?5, capacity = ?6, image_url = ?7, updated_at = ?8 \
                 WHERE id = ?9 AND user_id = ?10",
                params![
                    vehicle.make,
                    vehicle.model,
                    vehicle.year,
                    vehicle.color,
                    vehicle.license_plate,
                    vehicle.capacity,
                    vehicle.image_url,
                    vehicle.updated_at,
                    id.to_string(),
                    user_id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(vehicle)
        })
    }

    pub fn delete_vehicle(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM vehicles WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if changed == 0 {
                return Err(DbError::NotOwner(
                    "Vehicle not found or does not belong to user",
                ));
            }
            Ok(())
        })
    }
}
