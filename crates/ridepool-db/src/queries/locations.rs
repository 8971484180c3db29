use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::{AddLocationRequest, UpdateLocationRequest};
use ridepool_types::models::Location;

use crate::queries::uuid_col;
use crate::{Database, DbError, Result};

const LOCATION_COLUMNS: &str =
    "id, user_id, name, address, latitude, longitude, is_favorite, created_at, updated_at";

fn location_from_row(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        is_favorite: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_location(conn: &Connection, id: Uuid, owner: Option<Uuid>) -> Result<Option<Location>> {
    let location = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1 AND user_id = ?2"
            ))?
            .query_row(params![id.to_string(), user_id.to_string()], location_from_row)
            .optional()?,
        None => conn
            .prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"))?
            .query_row([id.to_string()], location_from_row)
            .optional()?,
    };
    Ok(location)
}

impl Database {
    pub fn list_locations(&self, user_id: Uuid) -> Result<Vec<Location>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOCATION_COLUMNS} FROM locations WHERE user_id = ?1 ORDER BY created_at"
            ))?;
            let locations = stmt
                .query_map([user_id.to_string()], location_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(locations)
        })
    }

    pub fn get_location(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Location>> {
        self.with_conn(|conn| query_location(conn, id, owner))
    }

    pub fn add_location(&self, user_id: Uuid, req: &AddLocationRequest) -> Result<Location> {
        let now = Utc::now();
        let location = Location {
            id: Uuid::new_v4(),
            user_id,
            name: req.name.clone(),
            address: req.address.clone(),
            latitude: req.latitude,
            longitude: req.longitude,
            is_favorite: req.is_favorite,
            created_at: now,
            updated_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO locations (id, user_id, name, address, latitude, longitude, \
                 is_favorite, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    location.id.to_string(),
                    location.user_id.to_string(),
                    location.name,
                    location.address,
                    location.latitude,
                    location.longitude,
                    location.is_favorite,
                    location.created_at,
                    location.updated_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(location)
    }

    pub fn update_location(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &UpdateLocationRequest,
    ) -> Result<Location> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut location = query_location(&tx, id, Some(user_id))?
                .ok_or(DbError::NotOwner("Location not found or does not belong to user"))?;

            if let Some(name) = &req.name {
                location.name = name.clone();
            }
            if let Some(address) = &req.address {
                location.address = address.clone();
            }
            if let Some(lat) = req.latitude {
                location.latitude = lat;
            }
            if let Some(lng) = req.longitude {
                location.longitude = lng;
            }
            if let Some(favorite) = req.is_favorite {
                location.is_favorite = favorite;
            }
            location.updated_at = Utc::now();

            tx.execute(
                "UPDATE locations SET name = ?1, address = ?2, latitude = ?3, longitude = ?4, \
                 is_favorite = ?5, updated_at = ?6 WHERE id = ?7 AND user_id = ?8",
                params![
                    location.name,
                    location.address,
                    location.latitude,
                    location.longitude,
                    location.is_favorite,
                    location.updated_at,
                    id.to_string(),
                    user_id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(location)
        })
    }

    pub fn delete_location(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM locations WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if changed == 0 {
                return Err(DbError::NotOwner(
                    "Location not found or does not belong to user",
                ));
            }
            Ok(())
        })
    }

    /// Flips the favorite flag and returns the updated record.
    pub fn toggle_location_favorite(&self, id: Uuid, user_id: Uuid) -> Result<Location> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut location = query_location(&tx, id, Some(user_id))?
                .ok_or(DbError::NotOwner("Location not found or does not belong to user"))?;

            location.is_favorite = !location.is_favorite;
            location.updated_at = Utc::now();

            tx.execute(
                "UPDATE locations SET is_favorite = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND user_id = ?4",
                params![
                    location.is_favorite,
                    location.updated_at,
                    id.to_string(),
                    user_id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(location)
        })
    }
}
