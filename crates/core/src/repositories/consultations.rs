//! Consultation notes written by doctors for patients or guests.

use crate::db::{not_found, now_timestamp, Database};
use crate::identity::{resolve_subject, SubjectRef};
use crate::ownership::{ensure_can_view, ensure_doctor_owns, Actor};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{Consultation, ConsultationReq};
use rusqlite::{params, Connection, Row};

const CONSULTATION_SELECT: &str = "SELECT id, doctor_id, patient_id, guest_id, appointment_id,
        consultation_date, symptoms, diagnosis, notes, follow_up_date, fee, created_at, updated_at
    FROM consultations";

fn consultation_from_row(row: &Row<'_>) -> rusqlite::Result<Consultation> {
    Ok(Consultation {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        guest_id: row.get(3)?,
        appointment_id: row.get(4)?,
        consultation_date: row.get(5)?,
        symptoms: row.get(6)?,
        diagnosis: row.get(7)?,
        notes: row.get(8)?,
        follow_up_date: row.get(9)?,
        fee: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn load_consultation(conn: &Connection, id: i64) -> ClinicResult<Consultation> {
    conn.query_row(
        &format!("{CONSULTATION_SELECT} WHERE id = ?1"),
        [id],
        consultation_from_row,
    )
    .map_err(not_found("consultation"))
}

/// Records an error unless `appointment_id` names one of `doctor_id`'s appointments.
pub(crate) fn check_doctor_appointment(
    conn: &Connection,
    errors: &mut ValidationErrors,
    doctor_id: i64,
    appointment_id: Option<i64>,
) -> ClinicResult<Option<i64>> {
    let Some(appointment_id) = appointment_id else {
        return Ok(None);
    };
    let owned: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM appointments WHERE id = ?1 AND doctor_id = ?2)",
        params![appointment_id, doctor_id],
        |row| row.get(0),
    )?;
    if owned != 1 {
        errors.add("appointment_id", "The selected appointment id is invalid.");
        return Ok(None);
    }
    Ok(Some(appointment_id))
}

struct ConsultationFields {
    subject: SubjectRef,
    appointment_id: Option<i64>,
    consultation_date: String,
    symptoms: Option<String>,
    diagnosis: Option<String>,
    notes: Option<String>,
    follow_up_date: Option<String>,
    fee: Option<f64>,
}

fn validate(
    conn: &Connection,
    doctor_id: i64,
    req: &ConsultationReq,
) -> ClinicResult<ConsultationFields> {
    let mut errors = ValidationErrors::new();
    let subject = resolve_subject(conn, &mut errors, "patient_id", req.patient_id.as_deref())?;
    let appointment_id = check_doctor_appointment(
        conn,
        &mut errors,
        doctor_id,
        req.appointment_id,
    )?;
    let consultation_date = validation::required_date(
        &mut errors,
        "consultation_date",
        req.consultation_date.as_deref(),
    );
    let follow_up_date =
        validation::optional_date(&mut errors, "follow_up_date", req.follow_up_date.as_deref());
    if let (Some(start), Some(follow_up)) = (consultation_date, follow_up_date) {
        if follow_up < start {
            errors.add(
                "follow_up_date",
                "The follow up date must be a date after or equal to consultation date.",
            );
        }
    }
    let symptoms = validation::optional_text(
        &mut errors,
        "symptoms",
        req.symptoms.as_deref(),
        LONG_TEXT_MAX,
    );
    let diagnosis = validation::optional_text(
        &mut errors,
        "diagnosis",
        req.diagnosis.as_deref(),
        LONG_TEXT_MAX,
    );
    let notes = validation::optional_text(
        &mut errors,
        "notes",
        req.notes.as_deref(),
        LONG_TEXT_MAX,
    );
    let fee = validation::non_negative(&mut errors, "fee", req.fee);
    errors.into_result()?;

    let (Some(subject), Some(consultation_date)) = (subject, consultation_date) else {
        return Err(ClinicError::InvalidInput("consultation fields missing".into()));
    };
    Ok(ConsultationFields {
        subject,
        appointment_id,
        consultation_date: validation::format_date(consultation_date),
        symptoms,
        diagnosis,
        notes,
        follow_up_date: follow_up_date.map(validation::format_date),
        fee,
    })
}

#[derive(Clone, Debug)]
pub struct ConsultationService {
    db: Database,
}

impl ConsultationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, doctor_id: i64, req: &ConsultationReq) -> ClinicResult<Consultation> {
        let conn = self.db.lock()?;
        let fields = validate(&conn, doctor_id, req)?;
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO consultations (doctor_id, patient_id, guest_id, appointment_id,
                consultation_date, symptoms, diagnosis, notes, follow_up_date, fee,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                doctor_id,
                fields.subject.patient_id(),
                fields.subject.guest_id(),
                fields.appointment_id,
                fields.consultation_date,
                fields.symptoms,
                fields.diagnosis,
                fields.notes,
                fields.follow_up_date,
                fields.fee,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(
            consultation_id = id,
            doctor_id,
            subject = %fields.subject,
            "consultation recorded"
        );
        load_consultation(&conn, id)
    }

    pub fn list_for_doctor(&self, doctor_id: i64) -> ClinicResult<Vec<Consultation>> {
        self.list_where("doctor_id", doctor_id)
    }

    pub fn list_for_patient(&self, patient_id: i64) -> ClinicResult<Vec<Consultation>> {
        self.list_where("patient_id", patient_id)
    }

    fn list_where(&self, column: &str, id: i64) -> ClinicResult<Vec<Consultation>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{CONSULTATION_SELECT} WHERE {column} = ?1 ORDER BY consultation_date DESC, id DESC"
        ))?;
        let rows = stmt.query_map([id], consultation_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, actor: Actor, id: i64) -> ClinicResult<Consultation> {
        let conn = self.db.lock()?;
        let consultation = load_consultation(&conn, id)?;
        ensure_can_view(actor, consultation.doctor_id, consultation.patient_id)?;
        Ok(consultation)
    }

    /// Replace every field of a consultation the doctor owns.
    pub fn update(
        &self,
        doctor_id: i64,
        id: i64,
        req: &ConsultationReq,
    ) -> ClinicResult<Consultation> {
        let conn = self.db.lock()?;
        let existing = load_consultation(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        let fields = validate(&conn, doctor_id, req)?;
        conn.execute(
            "UPDATE consultations SET patient_id = ?1, guest_id = ?2, appointment_id = ?3,
                consultation_date = ?4, symptoms = ?5, diagnosis = ?6, notes = ?7,
                follow_up_date = ?8, fee = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                fields.subject.patient_id(),
                fields.subject.guest_id(),
                fields.appointment_id,
                fields.consultation_date,
                fields.symptoms,
                fields.diagnosis,
                fields.notes,
                fields.follow_up_date,
                fields.fee,
                now_timestamp(),
                id,
            ],
        )?;
        load_consultation(&conn, id)
    }

    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let existing = load_consultation(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute("DELETE FROM consultations WHERE id = ?1", [id])?;
        tracing::info!(consultation_id = id, doctor_id, "consultation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_appointment, seed_doctor, seed_guest, seed_patient};

    fn req(patient_id: &str) -> ConsultationReq {
        ConsultationReq {
            patient_id: Some(patient_id.into()),
            consultation_date: Some("2030-01-07".into()),
            diagnosis: Some("Seasonal allergies".into()),
            fee: Some(40.0),
            ..Default::default()
        }
    }

    #[test]
    fn guest_identifier_sets_guest_column() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let guest = seed_guest(&db);
        let service = ConsultationService::new(db);

        let created = service
            .create(doctor.id, &req(&format!("guest_{guest}")))
            .unwrap();
        assert_eq!(created.guest_id, Some(guest));
        assert_eq!(created.patient_id, None);
    }

    #[test]
    fn follow_up_cannot_precede_consultation() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = ConsultationService::new(db);

        let mut bad = req(&patient.id.to_string());
        bad.follow_up_date = Some("2030-01-01".into());
        bad.fee = Some(-5.0);
        let ClinicError::Validation(errors) = service.create(doctor.id, &bad).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.has("follow_up_date"));
        assert!(errors.has("fee"));
    }

    #[test]
    fn appointment_must_belong_to_doctor() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let foreign = seed_appointment(
            &db,
            other.id,
            Some(patient.id),
            None,
            "2030-01-07",
            "09:00",
            "pending",
        );
        let service = ConsultationService::new(db);

        let mut with_appointment = req(&patient.id.to_string());
        with_appointment.appointment_id = Some(foreign);
        let err = service.create(doctor.id, &with_appointment).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("appointment_id")));
    }

    #[test]
    fn only_owner_updates_and_patient_can_view() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let service = ConsultationService::new(db);
        let created = service.create(doctor.id, &req(&patient.id.to_string())).unwrap();

        assert!(matches!(
            service.update(other.id, created.id, &req(&patient.id.to_string())),
            Err(ClinicError::Forbidden)
        ));
        assert!(matches!(service.delete(other.id, created.id), Err(ClinicError::Forbidden)));
        assert!(service.get(Actor::Patient(patient.id), created.id).is_ok());
        assert_eq!(service.list_for_patient(patient.id).unwrap().len(), 1);

        let mut changed = req(&patient.id.to_string());
        changed.notes = Some("Review in two weeks".into());
        let updated = service.update(doctor.id, created.id, &changed).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Review in two weeks"));
        service.delete(doctor.id, created.id).unwrap();
        assert!(service.list_for_doctor(doctor.id).unwrap().is_empty());
    }
}
