//! Patient reviews of doctors. One review per (doctor, patient) pair.

use crate::db::{not_found, now_timestamp, Database};
use crate::ownership::ensure_patient_owns;
use crate::repositories::doctors::doctor_active;
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{CreateReviewReq, Review};
use rusqlite::{params, Connection, Row};

const REVIEW_SELECT: &str = "SELECT r.id, r.doctor_id, r.patient_id, p.name, r.rating, r.comment,
        r.created_at
    FROM doctor_reviews r
    JOIN patients p ON p.id = r.patient_id";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        patient_name: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn load_review(conn: &Connection, id: i64) -> ClinicResult<Review> {
    conn.query_row(&format!("{REVIEW_SELECT} WHERE r.id = ?1"), [id], review_from_row)
        .map_err(not_found("review"))
}

#[derive(Clone, Debug)]
pub struct ReviewService {
    db: Database,
}

impl ReviewService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record `patient_id`'s review of an active doctor.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for an unknown doctor, a rating outside 1..=5, or
    /// when the patient has already reviewed this doctor.
    pub fn create(&self, patient_id: i64, req: &CreateReviewReq) -> ClinicResult<Review> {
        let conn = self.db.lock()?;
        let mut errors = ValidationErrors::new();
        let doctor_id = validation::required_id(&mut errors, "doctor_id", req.doctor_id);
        if let Some(id) = doctor_id {
            if doctor_active(&conn, id)? != Some(true) {
                errors.add("doctor_id", "The selected doctor id is invalid.");
            }
        }
        if req.rating.is_none() {
            errors.add("rating", "The rating field is required.");
        }
        let rating = validation::int_between(&mut errors, "rating", req.rating, 1, 5);
        let comment = validation::optional_text(
            &mut errors,
            "comment",
            req.comment.as_deref(),
            LONG_TEXT_MAX,
        );

        if let Some(id) = doctor_id {
            let already: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM doctor_reviews
                               WHERE doctor_id = ?1 AND patient_id = ?2)",
                params![id, patient_id],
                |row| row.get(0),
            )?;
            if already == 1 {
                errors.add("doctor_id", "You have already reviewed this doctor.");
            }
        }
        errors.into_result()?;
        let (Some(doctor_id), Some(rating)) = (doctor_id, rating) else {
            return Err(ClinicError::InvalidInput("review fields missing".into()));
        };

        conn.execute(
            "INSERT INTO doctor_reviews (doctor_id, patient_id, rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![doctor_id, patient_id, rating, comment, now_timestamp()],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(review_id = id, doctor_id, patient_id, rating, "review created");
        load_review(&conn, id)
    }

    /// Reviews of one doctor, newest first.
    pub fn list_for_doctor(&self, doctor_id: i64) -> ClinicResult<Vec<Review>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{REVIEW_SELECT} WHERE r.doctor_id = ?1 ORDER BY r.created_at DESC, r.id DESC"
        ))?;
        let rows = stmt.query_map([doctor_id], review_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete(&self, patient_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let review = load_review(&conn, id)?;
        ensure_patient_owns(Some(review.patient_id), patient_id)?;
        conn.execute("DELETE FROM doctor_reviews WHERE id = ?1", [id])?;
        tracing::info!(review_id = id, patient_id, "review deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::doctors::DoctorService;
    use crate::test_support::{seed_doctor, seed_patient};

    fn review(doctor_id: i64, rating: i64) -> CreateReviewReq {
        CreateReviewReq {
            doctor_id: Some(doctor_id),
            rating: Some(rating),
            comment: Some("Very thorough".into()),
        }
    }

    #[test]
    fn second_review_of_same_doctor_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = ReviewService::new(db);

        let created = service.create(patient.id, &review(doctor.id, 5)).unwrap();
        assert_eq!(created.patient_name, "Grace Hopper");

        let err = service.create(patient.id, &review(doctor.id, 3)).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("doctor_id")));
    }

    #[test]
    fn rating_must_be_between_one_and_five() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = ReviewService::new(db);

        for rating in [0, 6] {
            let err = service.create(patient.id, &review(doctor.id, rating)).unwrap_err();
            assert!(matches!(err, ClinicError::Validation(e) if e.has("rating")));
        }
        let missing = CreateReviewReq {
            doctor_id: Some(doctor.id),
            ..Default::default()
        };
        let err = service.create(patient.id, &missing).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("rating")));
    }

    #[test]
    fn reviews_feed_doctor_aggregates() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let first = seed_patient(&db, "one@example.com");
        let second = seed_patient(&db, "two@example.com");
        let service = ReviewService::new(db.clone());

        service.create(first.id, &review(doctor.id, 5)).unwrap();
        service.create(second.id, &review(doctor.id, 4)).unwrap();

        assert_eq!(service.list_for_doctor(doctor.id).unwrap().len(), 2);
        let listed = DoctorService::new(db).get_public(doctor.id).unwrap();
        assert_eq!(listed.review_count, 2);
        assert!((listed.average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn only_author_deletes_review() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let author = seed_patient(&db, "one@example.com");
        let other = seed_patient(&db, "two@example.com");
        let service = ReviewService::new(db);
        let created = service.create(author.id, &review(doctor.id, 2)).unwrap();

        assert!(matches!(service.delete(other.id, created.id), Err(ClinicError::Forbidden)));
        service.delete(author.id, created.id).unwrap();
        assert!(matches!(service.delete(author.id, created.id), Err(ClinicError::NotFound(_))));
    }
}
