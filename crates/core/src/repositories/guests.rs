//! Walk-in booking subjects.

use crate::db::{not_found, now_timestamp, Database};
use crate::{ClinicError, ClinicResult};
use api_shared::Guest;
use rusqlite::{params, Connection, Row};

/// Validated guest details ready to insert.
#[derive(Clone, Debug)]
pub(crate) struct NewGuest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub gender: Option<String>,
    pub address: Option<String>,
}

fn guest_from_row(row: &Row<'_>) -> rusqlite::Result<Guest> {
    Ok(Guest {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        date_of_birth: row.get(4)?,
        gender: row.get(5)?,
        address: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn insert_guest(conn: &Connection, guest: &NewGuest) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO guests (name, email, phone, date_of_birth, gender, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            guest.name,
            guest.email,
            guest.phone,
            guest.date_of_birth,
            guest.gender,
            guest.address,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn load_guest(conn: &Connection, id: i64) -> ClinicResult<Guest> {
    conn.query_row(
        "SELECT id, name, email, phone, date_of_birth, gender, address, created_at
         FROM guests WHERE id = ?1",
        [id],
        guest_from_row,
    )
    .map_err(not_found("guest"))
}

#[derive(Clone, Debug)]
pub struct GuestService {
    db: Database,
}

impl GuestService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// A guest's details, visible only to doctors the guest has booked with.
    pub fn get_for_doctor(&self, doctor_id: i64, guest_id: i64) -> ClinicResult<Guest> {
        let conn = self.db.lock()?;
        let guest = load_guest(&conn, guest_id)?;
        let booked: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM appointments WHERE guest_id = ?1 AND doctor_id = ?2)",
            params![guest_id, doctor_id],
            |row| row.get(0),
        )?;
        if booked != 1 {
            return Err(ClinicError::Forbidden);
        }
        Ok(guest)
    }
}
