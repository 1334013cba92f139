//! Doctor directory and profile maintenance.

use crate::db::{contains_pattern, not_found, now_timestamp, Database};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::ClinicResult;
use api_shared::{Doctor, DoctorQuery, UpdateDoctorProfileReq};
use rusqlite::{params, Connection, Row};

/// Columns selected for a [`Doctor`], including review aggregates. Alias the table as `d`.
const DOCTOR_SELECT: &str = "SELECT d.id, d.name, d.email, d.phone, d.specialization,
        d.qualification, d.experience_years, d.bio, d.consultation_fee, d.is_active,
        d.created_at,
        COALESCE(
            (SELECT ROUND(AVG(r.rating), 1) FROM doctor_reviews r WHERE r.doctor_id = d.id),
            0.0,
        ),
        (SELECT COUNT(*) FROM doctor_reviews r WHERE r.doctor_id = d.id)
    FROM doctors d";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        specialization: row.get(4)?,
        qualification: row.get(5)?,
        experience_years: row.get(6)?,
        bio: row.get(7)?,
        consultation_fee: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
        average_rating: row.get(11)?,
        review_count: row.get(12)?,
    })
}

pub(crate) fn load_doctor(conn: &Connection, id: i64) -> ClinicResult<Doctor> {
    conn.query_row(&format!("{DOCTOR_SELECT} WHERE d.id = ?1"), [id], doctor_from_row)
        .map_err(not_found("doctor"))
}

/// `Some(is_active)` for an existing doctor, `None` otherwise.
pub(crate) fn doctor_active(conn: &Connection, id: i64) -> ClinicResult<Option<bool>> {
    use rusqlite::OptionalExtension;
    Ok(conn
        .query_row("SELECT is_active FROM doctors WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?)
}

#[derive(Clone, Debug)]
pub struct DoctorService {
    db: Database,
}

impl DoctorService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Active doctors, optionally filtered by specialization (exact, case-insensitive) and a
    /// name fragment.
    pub fn list(&self, query: &DoctorQuery) -> ClinicResult<Vec<Doctor>> {
        let specialization = query
            .specialization
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let search = contains_pattern(query.search.as_deref());

        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{DOCTOR_SELECT}
             WHERE d.is_active = 1
               AND (?1 IS NULL OR d.specialization = ?1 COLLATE NOCASE)
               AND (?2 IS NULL OR d.name LIKE ?2 ESCAPE '\\')
             ORDER BY d.name, d.id"
        ))?;
        let rows = stmt.query_map(params![specialization, search], doctor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every doctor, active or not, ordered by id.
    pub fn list_all(&self) -> ClinicResult<Vec<Doctor>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!("{DOCTOR_SELECT} ORDER BY d.id"))?;
        let rows = stmt.query_map([], doctor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Public profile. Inactive doctors are reported as not found.
    pub fn get_public(&self, id: i64) -> ClinicResult<Doctor> {
        let conn = self.db.lock()?;
        let doctor = load_doctor(&conn, id)?;
        if !doctor.is_active {
            return Err(crate::ClinicError::NotFound("doctor"));
        }
        Ok(doctor)
    }

    pub fn get(&self, id: i64) -> ClinicResult<Doctor> {
        let conn = self.db.lock()?;
        load_doctor(&conn, id)
    }

    /// Partial update of the doctor's own profile. Absent fields keep their value.
    pub fn update_profile(
        &self,
        doctor_id: i64,
        req: &UpdateDoctorProfileReq,
    ) -> ClinicResult<Doctor> {
        let mut errors = ValidationErrors::new();
        let name = match req.name.as_deref() {
            Some(raw) => validation::required_text(&mut errors, "name", Some(raw), SHORT_TEXT_MAX),
            None => None,
        };
        let specialization = match req.specialization.as_deref() {
            Some(raw) => {
                validation::required_text(&mut errors, "specialization", Some(raw), SHORT_TEXT_MAX)
            }
            None => None,
        };
        let phone = validation::optional_phone(&mut errors, "phone", req.phone.as_deref());
        let qualification = validation::optional_text(
            &mut errors,
            "qualification",
            req.qualification.as_deref(),
            SHORT_TEXT_MAX,
        );
        let experience_years =
            validation::int_between(&mut errors, "experience_years", req.experience_years, 0, 80);
        let fee = validation::non_negative(&mut errors, "consultation_fee", req.consultation_fee);
        let bio = validation::optional_text(&mut errors, "bio", req.bio.as_deref(), LONG_TEXT_MAX);
        errors.into_result()?;

        let conn = self.db.lock()?;
        load_doctor(&conn, doctor_id)?;
        conn.execute(
            "UPDATE doctors SET
                name = COALESCE(?1, name),
                specialization = COALESCE(?2, specialization),
                phone = COALESCE(?3, phone),
                qualification = COALESCE(?4, qualification),
                experience_years = COALESCE(?5, experience_years),
                consultation_fee = COALESCE(?6, consultation_fee),
                bio = COALESCE(?7, bio),
                updated_at = ?8
             WHERE id = ?9",
            params![
                name.as_ref().map(|n| n.as_str()),
                specialization.as_ref().map(|s| s.as_str()),
                phone.as_ref().map(|p| p.as_str()),
                qualification,
                experience_years,
                fee,
                bio,
                now_timestamp(),
                doctor_id,
            ],
        )?;
        load_doctor(&conn, doctor_id)
    }

    /// Activate or deactivate a doctor account.
    pub fn set_active(&self, doctor_id: i64, active: bool) -> ClinicResult<Doctor> {
        let conn = self.db.lock()?;
        let changed = conn.execute(
            "UPDATE doctors SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, now_timestamp(), doctor_id],
        )?;
        if changed == 0 {
            return Err(crate::ClinicError::NotFound("doctor"));
        }
        tracing::info!(doctor_id, active, "doctor activation changed");
        load_doctor(&conn, doctor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::doctor_req;
    use crate::auth::AuthService;

    fn setup() -> (Database, AuthService) {
        let db = Database::open_in_memory().unwrap();
        (db.clone(), AuthService::new(db, None))
    }

    #[test]
    fn list_filters_by_specialization_and_name() {
        let (db, auth) = setup();
        auth.create_doctor(&doctor_req("a@example.com")).unwrap();
        let mut derm = doctor_req("b@example.com");
        derm.name = Some("Dr Bob Skin".into());
        derm.specialization = Some("Dermatology".into());
        auth.create_doctor(&derm).unwrap();

        let service = DoctorService::new(db);
        let all = service.list(&DoctorQuery::default()).unwrap();
        assert_eq!(all.len(), 2);

        let query = DoctorQuery {
            specialization: Some("dermatology".into()),
            search: None,
        };
        let found = service.list(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Dr Bob Skin");

        let query = DoctorQuery {
            specialization: None,
            search: Some("Ada".into()),
        };
        assert_eq!(service.list(&query).unwrap().len(), 1);
    }

    #[test]
    fn inactive_doctors_are_hidden_from_directory() {
        let (db, auth) = setup();
        let doctor = auth.create_doctor(&doctor_req("a@example.com")).unwrap();
        let service = DoctorService::new(db);
        service.set_active(doctor.id, false).unwrap();

        assert!(service.list(&DoctorQuery::default()).unwrap().is_empty());
        assert!(matches!(
            service.get_public(doctor.id),
            Err(crate::ClinicError::NotFound("doctor"))
        ));
        assert_eq!(service.list_all().unwrap().len(), 1);
    }

    #[test]
    fn update_profile_keeps_absent_fields() {
        let (db, auth) = setup();
        let doctor = auth.create_doctor(&doctor_req("a@example.com")).unwrap();
        let service = DoctorService::new(db);

        let req = UpdateDoctorProfileReq {
            bio: Some("Twenty years in practice.".into()),
            consultation_fee: Some(50.0),
            ..Default::default()
        };
        let updated = service.update_profile(doctor.id, &req).unwrap();
        assert_eq!(updated.name, "Dr Ada Lovelace");
        assert_eq!(updated.bio.as_deref(), Some("Twenty years in practice."));
        assert_eq!(updated.consultation_fee, Some(50.0));
    }

    #[test]
    fn update_profile_rejects_negative_fee() {
        let (db, auth) = setup();
        let doctor = auth.create_doctor(&doctor_req("a@example.com")).unwrap();
        let req = UpdateDoctorProfileReq {
            consultation_fee: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            DoctorService::new(db).update_profile(doctor.id, &req),
            Err(crate::ClinicError::Validation(_))
        ));
    }
}
