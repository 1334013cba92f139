//! Appointment listing and lifecycle.
//!
//! Appointments are created by [`crate::booking`]; this module covers everything after:
//! listing for either party, status transitions, patient cancellation and deletion.

use crate::db::{not_found, now_timestamp, Database};
use crate::ownership::{ensure_can_view, ensure_doctor_owns, ensure_patient_owns, Actor};
use crate::validation::{self, ValidationErrors};
use crate::{ClinicError, ClinicResult};
use api_shared::{Appointment, AppointmentQuery, UpdateAppointmentStatusReq};
use rusqlite::{params, Connection, Row};
use std::fmt;

pub(crate) const APPOINTMENT_SELECT: &str = "SELECT id, doctor_id, patient_id, guest_id, name,
        email, phone, date, time, status, message, created_at, updated_at
    FROM appointments";

/// Lifecycle state of an appointment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [&'static str; 4] = ["pending", "confirmed", "completed", "cancelled"];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending and confirmed appointments hold their slot.
    pub fn is_open(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        guest_id: row.get(3)?,
        name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        date: row.get(7)?,
        time: row.get(8)?,
        status: row.get(9)?,
        message: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn load_appointment(conn: &Connection, id: i64) -> ClinicResult<Appointment> {
    conn.query_row(
        &format!("{APPOINTMENT_SELECT} WHERE id = ?1"),
        [id],
        appointment_from_row,
    )
    .map_err(not_found("appointment"))
}

fn status_of(appointment: &Appointment) -> ClinicResult<AppointmentStatus> {
    AppointmentStatus::parse(&appointment.status).ok_or_else(|| {
        ClinicError::CorruptRow(format!(
            "appointment {} has status {}",
            appointment.id, appointment.status
        ))
    })
}

/// Validated list filters.
fn list_filters(query: &AppointmentQuery) -> ClinicResult<(Option<String>, Option<String>)> {
    let mut errors = ValidationErrors::new();
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => validation::one_of(&mut errors, "status", Some(raw), &AppointmentStatus::ALL),
        None => None,
    };
    let date = validation::optional_date(&mut errors, "date", query.date.as_deref())
        .map(validation::format_date);
    errors.into_result()?;
    Ok((status, date))
}

#[derive(Clone, Debug)]
pub struct AppointmentService {
    db: Database,
}

impl AppointmentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn list_for_doctor(
        &self,
        doctor_id: i64,
        query: &AppointmentQuery,
    ) -> ClinicResult<Vec<Appointment>> {
        self.list_where("doctor_id", doctor_id, query)
    }

    pub fn list_for_patient(
        &self,
        patient_id: i64,
        query: &AppointmentQuery,
    ) -> ClinicResult<Vec<Appointment>> {
        self.list_where("patient_id", patient_id, query)
    }

    fn list_where(
        &self,
        owner_column: &str,
        owner_id: i64,
        query: &AppointmentQuery,
    ) -> ClinicResult<Vec<Appointment>> {
        let (status, date) = list_filters(query)?;
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{APPOINTMENT_SELECT}
             WHERE {owner_column} = ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR date = ?3)
             ORDER BY date DESC, time DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id, status, date], appointment_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// # Errors
    ///
    /// Returns `ClinicError::Forbidden` unless `actor` is the appointment's doctor or patient.
    pub fn get(&self, actor: Actor, id: i64) -> ClinicResult<Appointment> {
        let conn = self.db.lock()?;
        let appointment = load_appointment(&conn, id)?;
        ensure_can_view(actor, appointment.doctor_id, appointment.patient_id)?;
        Ok(appointment)
    }

    /// Move an appointment to a new status.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Forbidden` for another doctor's appointment and
    /// `ClinicError::Validation` for an unknown status or a disallowed transition.
    pub fn update_status(
        &self,
        doctor_id: i64,
        id: i64,
        req: &UpdateAppointmentStatusReq,
    ) -> ClinicResult<Appointment> {
        let mut errors = ValidationErrors::new();
        let next = validation::one_of(
            &mut errors,
            "status",
            req.status.as_deref(),
            &AppointmentStatus::ALL,
        )
        .and_then(|s| AppointmentStatus::parse(&s));
        errors.into_result()?;
        let Some(next) = next else {
            return Err(ClinicError::field("status", "The selected status is invalid."));
        };

        let conn = self.db.lock()?;
        let appointment = load_appointment(&conn, id)?;
        ensure_doctor_owns(appointment.doctor_id, doctor_id)?;
        let current = status_of(&appointment)?;
        if !current.can_transition_to(next) {
            return Err(ClinicError::field(
                "status",
                format!("An appointment cannot move from {current} to {next}."),
            ));
        }

        set_status(&conn, id, next)?;
        tracing::info!(
            appointment_id = id,
            from = %current,
            to = %next,
            "appointment status changed"
        );
        load_appointment(&conn, id)
    }

    /// Patient cancels their own pending or confirmed appointment.
    pub fn cancel(&self, patient_id: i64, id: i64) -> ClinicResult<Appointment> {
        let conn = self.db.lock()?;
        let appointment = load_appointment(&conn, id)?;
        ensure_patient_owns(appointment.patient_id, patient_id)?;
        let current = status_of(&appointment)?;
        if !current.is_open() {
            return Err(ClinicError::field(
                "status",
                format!("A {current} appointment cannot be cancelled."),
            ));
        }

        set_status(&conn, id, AppointmentStatus::Cancelled)?;
        tracing::info!(appointment_id = id, patient_id, "appointment cancelled by patient");
        load_appointment(&conn, id)
    }

    /// Delete a cancelled appointment.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Forbidden` for another doctor's appointment and
    /// `ClinicError::Validation` unless the appointment is cancelled.
    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let appointment = load_appointment(&conn, id)?;
        ensure_doctor_owns(appointment.doctor_id, doctor_id)?;
        if status_of(&appointment)? != AppointmentStatus::Cancelled {
            return Err(ClinicError::field(
                "status",
                "Only cancelled appointments can be deleted.",
            ));
        }

        conn.execute("DELETE FROM appointments WHERE id = ?1", [id])?;
        tracing::info!(appointment_id = id, doctor_id, "appointment deleted");
        Ok(())
    }
}

fn set_status(conn: &Connection, id: i64, status: AppointmentStatus) -> ClinicResult<()> {
    conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_timestamp(), id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_appointment, seed_doctor, seed_guest, seed_patient};

    fn status_req(status: &str) -> UpdateAppointmentStatusReq {
        UpdateAppointmentStatusReq {
            status: Some(status.into()),
        }
    }

    #[test]
    fn transitions() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn update_status_follows_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let id = seed_appointment(&db, doctor.id, None, None, "2030-01-01", "09:00", "pending");
        let service = AppointmentService::new(db);

        let err = service
            .update_status(doctor.id, id, &status_req("completed"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("status")));

        let confirmed = service
            .update_status(doctor.id, id, &status_req("Confirmed"))
            .unwrap();
        assert_eq!(confirmed.status, "confirmed");
    }

    #[test]
    fn other_doctor_cannot_touch_appointment() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_doctor(&db, "owner@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let id = seed_appointment(&db, owner.id, None, None, "2030-01-01", "09:00", "cancelled");
        let service = AppointmentService::new(db);

        assert!(matches!(
            service.update_status(other.id, id, &status_req("confirmed")),
            Err(ClinicError::Forbidden)
        ));
        assert!(matches!(service.delete(other.id, id), Err(ClinicError::Forbidden)));
        assert!(matches!(
            service.get(Actor::Doctor(other.id), id),
            Err(ClinicError::Forbidden)
        ));
    }

    #[test]
    fn delete_requires_cancelled_status() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let pending = seed_appointment(
            &db,
            doctor.id,
            None,
            None,
            "2030-01-01",
            "09:00",
            "pending",
        );
        let cancelled =
            seed_appointment(&db, doctor.id, None, None, "2030-01-01", "10:00", "cancelled");
        let service = AppointmentService::new(db);

        assert!(matches!(
            service.delete(doctor.id, pending),
            Err(ClinicError::Validation(_))
        ));
        service.delete(doctor.id, cancelled).unwrap();
        assert!(matches!(
            service.get(Actor::Doctor(doctor.id), cancelled),
            Err(ClinicError::NotFound("appointment"))
        ));
    }

    #[test]
    fn patient_cancels_own_open_appointment() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let intruder = seed_patient(&db, "intruder@example.com");
        let id = seed_appointment(
            &db,
            doctor.id,
            Some(patient.id),
            None,
            "2030-01-01",
            "09:00",
            "confirmed",
        );
        let service = AppointmentService::new(db);

        assert!(matches!(service.cancel(intruder.id, id), Err(ClinicError::Forbidden)));
        assert_eq!(service.cancel(patient.id, id).unwrap().status, "cancelled");
        assert!(matches!(service.cancel(patient.id, id), Err(ClinicError::Validation(_))));
    }

    #[test]
    fn lists_are_scoped_and_filtered() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let other = seed_doctor(&db, "other@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        let guest = seed_guest(&db);
        seed_appointment(&db, doctor.id, Some(patient.id), None, "2030-01-01", "09:00", "pending");
        seed_appointment(&db, doctor.id, None, Some(guest), "2030-01-02", "09:00", "confirmed");
        seed_appointment(&db, other.id, Some(patient.id), None, "2030-01-01", "11:00", "pending");
        let service = AppointmentService::new(db);

        assert_eq!(
            service
                .list_for_doctor(doctor.id, &AppointmentQuery::default())
                .unwrap()
                .len(),
            2
        );
        let pending = AppointmentQuery {
            status: Some("pending".into()),
            date: None,
        };
        assert_eq!(service.list_for_doctor(doctor.id, &pending).unwrap().len(), 1);
        assert_eq!(
            service
                .list_for_patient(patient.id, &AppointmentQuery::default())
                .unwrap()
                .len(),
            2
        );

        let bad = AppointmentQuery {
            status: Some("archived".into()),
            date: None,
        };
        assert!(matches!(
            service.list_for_doctor(doctor.id, &bad),
            Err(ClinicError::Validation(_))
        ));
    }
}
