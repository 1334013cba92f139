//! Practice photo galleries.

use crate::db::{not_found, now_timestamp, Database};
use crate::ownership::ensure_doctor_owns;
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{Gallery, GalleryReq};
use rusqlite::{params, Connection, Row};

const GALLERY_SELECT: &str =
    "SELECT id, doctor_id, title, image_url, description, created_at FROM galleries";

fn gallery_from_row(row: &Row<'_>) -> rusqlite::Result<Gallery> {
    Ok(Gallery {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        title: row.get(2)?,
        image_url: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn load_gallery(conn: &Connection, id: i64) -> ClinicResult<Gallery> {
    conn.query_row(&format!("{GALLERY_SELECT} WHERE id = ?1"), [id], gallery_from_row)
        .map_err(not_found("gallery"))
}

#[derive(Clone, Debug)]
pub struct GalleryService {
    db: Database,
}

impl GalleryService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Gallery items, newest first; restricted to one doctor when `doctor_id` is given.
    pub fn list(&self, doctor_id: Option<i64>) -> ClinicResult<Vec<Gallery>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{GALLERY_SELECT} WHERE (?1 IS NULL OR doctor_id = ?1)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([doctor_id], gallery_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, id: i64) -> ClinicResult<Gallery> {
        let conn = self.db.lock()?;
        load_gallery(&conn, id)
    }

    pub fn create(&self, doctor_id: i64, req: &GalleryReq) -> ClinicResult<Gallery> {
        let mut errors = ValidationErrors::new();
        let title = validation::required_text(
            &mut errors,
            "title",
            req.title.as_deref(),
            SHORT_TEXT_MAX,
        );
        let image_url = validation::required_text(
            &mut errors,
            "image_url",
            req.image_url.as_deref(),
            SHORT_TEXT_MAX,
        );
        let description = validation::optional_text(
            &mut errors,
            "description",
            req.description.as_deref(),
            LONG_TEXT_MAX,
        );
        errors.into_result()?;
        let (Some(title), Some(image_url)) = (title, image_url) else {
            return Err(ClinicError::InvalidInput("gallery fields missing".into()));
        };

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO galleries (doctor_id, title, image_url, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![doctor_id, title.as_str(), image_url.as_str(), description, now_timestamp()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(gallery_id = id, doctor_id, "gallery item created");
        load_gallery(&conn, id)
    }

    /// Partial update of an item the doctor owns.
    pub fn update(&self, doctor_id: i64, id: i64, req: &GalleryReq) -> ClinicResult<Gallery> {
        let mut errors = ValidationErrors::new();
        let title = match req.title.as_deref() {
            Some(raw) => validation::required_text(&mut errors, "title", Some(raw), SHORT_TEXT_MAX),
            None => None,
        };
        let image_url = match req.image_url.as_deref() {
            Some(raw) => validation::required_text(
                &mut errors,
                "image_url",
                Some(raw),
                SHORT_TEXT_MAX,
            ),
            None => None,
        };
        let description = validation::optional_text(
            &mut errors,
            "description",
            req.description.as_deref(),
            LONG_TEXT_MAX,
        );
        errors.into_result()?;

        let conn = self.db.lock()?;
        let existing = load_gallery(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute(
            "UPDATE galleries SET
                title = COALESCE(?1, title),
                image_url = COALESCE(?2, image_url),
                description = COALESCE(?3, description)
             WHERE id = ?4",
            params![
                title.as_ref().map(|t| t.as_str()),
                image_url.as_ref().map(|u| u.as_str()),
                description,
                id,
            ],
        )?;
        load_gallery(&conn, id)
    }

    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let existing = load_gallery(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute("DELETE FROM galleries WHERE id = ?1", [id])?;
        tracing::info!(gallery_id = id, doctor_id, "gallery item deleted");
        Ok(())
    }
}
