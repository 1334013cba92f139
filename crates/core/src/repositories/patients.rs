//! Patient profiles.

use crate::db::{not_found, now_timestamp, Database};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::ClinicResult;
use api_shared::{Patient, UpdatePatientProfileReq};
use rusqlite::{params, Connection, Row};

const PATIENT_SELECT: &str = "SELECT id, name, email, phone, gender, date_of_birth, address,
        blood_group, created_at
    FROM patients";

const BLOOD_GROUPS: &[&str] = &["a+", "a-", "b+", "b-", "ab+", "ab-", "o+", "o-"];

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        gender: row.get(4)?,
        date_of_birth: row.get(5)?,
        address: row.get(6)?,
        blood_group: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn load_patient(conn: &Connection, id: i64) -> ClinicResult<Patient> {
    conn.query_row(&format!("{PATIENT_SELECT} WHERE id = ?1"), [id], patient_from_row)
        .map_err(not_found("patient"))
}

#[derive(Clone, Debug)]
pub struct PatientService {
    db: Database,
}

impl PatientService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: i64) -> ClinicResult<Patient> {
        let conn = self.db.lock()?;
        load_patient(&conn, id)
    }

    pub fn list(&self) -> ClinicResult<Vec<Patient>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!("{PATIENT_SELECT} ORDER BY id"))?;
        let rows = stmt.query_map([], patient_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Partial update of the patient's own profile. Absent fields keep their value.
    pub fn update_profile(
        &self,
        patient_id: i64,
        req: &UpdatePatientProfileReq,
    ) -> ClinicResult<Patient> {
        let mut errors = ValidationErrors::new();
        let name = match req.name.as_deref() {
            Some(raw) => validation::required_text(&mut errors, "name", Some(raw), SHORT_TEXT_MAX),
            None => None,
        };
        let phone = validation::optional_phone(&mut errors, "phone", req.phone.as_deref());
        let gender = validation::optional_text(&mut errors, "gender", req.gender.as_deref(), 20);
        let date_of_birth =
            validation::optional_date(&mut errors, "date_of_birth", req.date_of_birth.as_deref());
        let address = validation::optional_text(
            &mut errors,
            "address",
            req.address.as_deref(),
            LONG_TEXT_MAX,
        );
        let blood_group = match req.blood_group.as_deref().filter(|b| !b.trim().is_empty()) {
            Some(raw) => validation::one_of(&mut errors, "blood_group", Some(raw), BLOOD_GROUPS)
                .map(|b| b.to_ascii_uppercase()),
            None => None,
        };
        errors.into_result()?;

        let conn = self.db.lock()?;
        load_patient(&conn, patient_id)?;
        conn.execute(
            "UPDATE patients SET
                name = COALESCE(?1, name),
                phone = COALESCE(?2, phone),
                gender = COALESCE(?3, gender),
                date_of_birth = COALESCE(?4, date_of_birth),
                address = COALESCE(?5, address),
                blood_group = COALESCE(?6, blood_group),
                updated_at = ?7
             WHERE id = ?8",
            params![
                name.as_ref().map(|n| n.as_str()),
                phone.as_ref().map(|p| p.as_str()),
                gender,
                date_of_birth.map(validation::format_date),
                address,
                blood_group,
                now_timestamp(),
                patient_id,
            ],
        )?;
        load_patient(&conn, patient_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::patient_req;
    use crate::auth::AuthService;

    #[test]
    fn update_profile_normalises_blood_group() {
        let db = Database::open_in_memory().unwrap();
        let patient = AuthService::new(db.clone(), None)
            .register_patient(&patient_req("grace@example.com"))
            .unwrap()
            .patient;
        let service = PatientService::new(db);

        let req = UpdatePatientProfileReq {
            blood_group: Some("ab-".into()),
            date_of_birth: Some("1990-05-01".into()),
            ..Default::default()
        };
        let updated = service.update_profile(patient.id, &req).unwrap();
        assert_eq!(updated.blood_group.as_deref(), Some("AB-"));
        assert_eq!(updated.date_of_birth.as_deref(), Some("1990-05-01"));
        assert_eq!(updated.name, "Grace Hopper");
    }

    #[test]
    fn update_profile_rejects_unknown_blood_group() {
        let db = Database::open_in_memory().unwrap();
        let patient = AuthService::new(db.clone(), None)
            .register_patient(&patient_req("grace@example.com"))
            .unwrap()
            .patient;
        let req = UpdatePatientProfileReq {
            blood_group: Some("C+".into()),
            ..Default::default()
        };
        let err = PatientService::new(db)
            .update_profile(patient.id, &req)
            .unwrap_err();
        assert!(matches!(err, crate::ClinicError::Validation(e) if e.has("blood_group")));
    }

    #[test]
    fn missing_patient_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            PatientService::new(db).get(42),
            Err(crate::ClinicError::NotFound("patient"))
        ));
    }
}
