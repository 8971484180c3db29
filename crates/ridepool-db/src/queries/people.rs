use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::{AddPersonRequest, UpdatePersonRequest};
use ridepool_types::models::Person;

use crate::queries::uuid_col;
use crate::{Database, DbError, Result};

const PERSON_COLUMNS: &str =
    "id, user_id, name, email, phone, profile_image_url, is_favorite, created_at, updated_at";

fn person_from_row(row: &Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        profile_image_url: row.get(5)?,
        is_favorite: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_person(conn: &Connection, id: Uuid, owner: Option<Uuid>) -> Result<Option<Person>> {
    let person = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1 AND user_id = ?2"
            ))?
            .query_row(params![id.to_string(), user_id.to_string()], person_from_row)
            .optional()?,
        None => conn
            .prepare(&format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1"))?
            .query_row([id.to_string()], person_from_row)
            .optional()?,
    };
    Ok(person)
}

impl Database {
    pub fn list_people(&self, user_id: Uuid) -> Result<Vec<Person>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PERSON_COLUMNS} FROM people WHERE user_id = ?1 ORDER BY created_at"
            ))?;
            let people = stmt
                .query_map([user_id.to_string()], person_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(people)
        })
    }

    pub fn get_person(&self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Person>> {
        self.with_conn(|conn| query_person(conn, id, owner))
    }

    pub fn add_person(&self, user_id: Uuid, req: &AddPersonRequest) -> Result<Person> {
        let now = Utc::now();
        let person = Person {
            id: Uuid::new_v4(),
            user_id,
            name: req.name.clone(),
            email: req.email.clone(),
            phone: req.phone.clone(),
            profile_image_url: req.profile_image_url.clone(),
            is_favorite: req.is_favorite,
            created_at: now,
            updated_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO people (id, user_id, name, email, phone, profile_image_url, \
                 is_favorite, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    person.id.to_string(),
                    person.user_id.to_string(),
                    person.name,
                    person.email,
                    person.phone,
                    person.profile_image_url,
                    person.is_favorite,
                    person.created_at,
                    person.updated_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(person)
    }

    pub fn update_person(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &UpdatePersonRequest,
    ) -> Result<Person> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut person = query_person(&tx, id, Some(user_id))?
                .ok_or(DbError::NotOwner("Person not found or does not belong to user"))?;

            if let Some(name) = &req.name {
                person.name = name.clone();
            }
            if let Some(email) = &req.email {
                person.email = Some(email.clone());
            }
            if let Some(phone) = &req.phone {
                person.phone = Some(phone.clone());
            }
            if let Some(url) = &req.profile_image_url {
                person.profile_image_url = Some(url.clone());
            }
            if let Some(favorite) = req.is_favorite {
                person.is_favorite = favorite;
            }
            person.updated_at = Utc::now();

            tx.execute(
                "UPDATE people SET name = ?1, email = ?2, phone = ?3, profile_image_url = ?4, \
                 is_favorite = ?5, updated_at = ?6 WHERE id = ?7 AND user_id = ?8",
                params![
                    person.name,
                    person.email,
                    person.phone,
                    person.profile_image_url,
                    person.is_favorite,
                    person.updated_at,
                    id.to_string(),
                    user_id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(person)
        })
    }

    pub fn delete_person(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM people WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if changed == 0 {
                return Err(DbError::NotOwner(
                    "Person not found or does not belong to user",
                ));
            }
            Ok(())
        })
    }

    pub fn toggle_person_favorite(&self, id: Uuid, user_id: Uuid) -> Result<Person> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut person = query_person(&tx, id, Some(user_id))?
                .ok_or(DbError::NotOwner("Person not found or does not belong to user"))?;

            person.is_favorite = !person.is_favorite;
            person.updated_at = Utc::now();

            tx.execute(
                "UPDATE people SET is_favorite = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND user_id = ?4",
                params![
                    person.is_favorite,
                    person.updated_at,
                    id.to_string(),
                    user_id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(person)
        })
    }
}
