//! Dashboard aggregates for doctors and patients.
//!
//! Every figure is computed on read from the underlying tables; nothing is cached.

use crate::constants::{DASHBOARD_UPCOMING_LIMIT, SATISFIED_RATING};
use crate::db::Database;
use crate::repositories::appointments::{appointment_from_row, APPOINTMENT_SELECT};
use crate::validation::format_date;
use crate::ClinicResult;
use api_shared::{DoctorDashboard, PatientDashboard};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Params};

fn count(conn: &Connection, sql: &str, params: impl Params) -> ClinicResult<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

/// Share of `satisfied` in `total` as a rounded percentage; 0 when `total` is 0.
pub fn satisfaction_percentage(satisfied: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (satisfied as f64 * 100.0 / total as f64).round() as i64
}

#[derive(Clone, Debug)]
pub struct DashboardService {
    db: Database,
}

impl DashboardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Figures for `doctor_id` as of `today`.
    pub fn doctor(&self, doctor_id: i64, today: NaiveDate) -> ClinicResult<DoctorDashboard> {
        let today = format_date(today);
        let conn = self.db.lock()?;

        let total_appointments = count(
            &conn,
            "SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1",
            [doctor_id],
        )?;
        let today_appointments = count(
            &conn,
            "SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1 AND date = ?2",
            params![doctor_id, today],
        )?;
        let pending_appointments = count(
            &conn,
            "SELECT COUNT(*) FROM appointments WHERE doctor_id = ?1 AND status = 'pending'",
            [doctor_id],
        )?;
        // Registered patients and guests are counted separately; COUNT(DISTINCT) skips NULLs.
        let unique_patients = count(
            &conn,
            "SELECT COUNT(DISTINCT patient_id) + COUNT(DISTINCT guest_id)
             FROM appointments WHERE doctor_id = ?1",
            [doctor_id],
        )?;

        let (average_rating, total_reviews, satisfied): (f64, i64, i64) = conn.query_row(
            "SELECT COALESCE(ROUND(AVG(rating), 1), 0.0), COUNT(*),
                    COALESCE(SUM(CASE WHEN rating >= ?2 THEN 1 ELSE 0 END), 0)
             FROM doctor_reviews WHERE doctor_id = ?1",
            params![doctor_id, SATISFIED_RATING],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let total_prescriptions = count(
            &conn,
            "SELECT COUNT(*) FROM prescriptions WHERE doctor_id = ?1",
            [doctor_id],
        )?;

        let mut stmt = conn.prepare(&format!(
            "{APPOINTMENT_SELECT}
             WHERE doctor_id = ?1 AND date >= ?2 AND status IN ('pending', 'confirmed')
             ORDER BY date, time, id
             LIMIT ?3"
        ))?;
        let upcoming = stmt
            .query_map(params![doctor_id, today, DASHBOARD_UPCOMING_LIMIT], appointment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DoctorDashboard {
            total_appointments,
            today_appointments,
            pending_appointments,
            unique_patients,
            average_rating,
            total_reviews,
            satisfaction_percentage: satisfaction_percentage(satisfied, total_reviews),
            total_prescriptions,
            upcoming,
        })
    }

    /// Figures for `patient_id` as of `today`.
    pub fn patient(&self, patient_id: i64, today: NaiveDate) -> ClinicResult<PatientDashboard> {
        let today = format_date(today);
        let conn = self.db.lock()?;
        Ok(PatientDashboard {
            total_appointments: count(
                &conn,
                "SELECT COUNT(*) FROM appointments WHERE patient_id = ?1",
                [patient_id],
            )?,
            upcoming_appointments: count(
                &conn,
                "SELECT COUNT(*) FROM appointments
                 WHERE patient_id = ?1 AND date >= ?2 AND status IN ('pending', 'confirmed')",
                params![patient_id, today],
            )?,
            medical_records: count(
                &conn,
                "SELECT COUNT(*) FROM medical_records WHERE patient_id = ?1",
                [patient_id],
            )?,
            active_prescriptions: count(
                &conn,
                "SELECT COUNT(*) FROM prescriptions
                 WHERE patient_id = ?1 AND is_active = 1
                   AND (valid_until IS NULL OR valid_until >= ?2)",
                params![patient_id, today],
            )?,
            consultations: count(
                &conn,
                "SELECT COUNT(*) FROM consultations WHERE patient_id = ?1",
                [patient_id],
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_appointment, seed_doctor, seed_guest, seed_patient};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn seed_review(db: &Database, doctor_id: i64, patient_id: i64, rating: i64) {
        db.lock()
            .unwrap()
            .execute(
                "INSERT INTO doctor_reviews (doctor_id, patient_id, rating, created_at)
                 VALUES (?1, ?2, ?3, '2030-01-01T00:00:00Z')",
                params![doctor_id, patient_id, rating],
            )
            .unwrap();
    }

    #[test]
    fn satisfaction_counts_ratings_of_four_and_above() {
        assert_eq!(satisfaction_percentage(0, 0), 0);
        assert_eq!(satisfaction_percentage(2, 3), 67);
        assert_eq!(satisfaction_percentage(1, 3), 33);
    }

    #[test]
    fn doctor_dashboard_aggregates() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let first = seed_patient(&db, "one@example.com");
        let second = seed_patient(&db, "two@example.com");
        let third = seed_patient(&db, "three@example.com");
        let guest = seed_guest(&db);

        seed_appointment(&db, doctor.id, Some(first.id), None, "2030-01-07", "09:00", "pending");
        seed_appointment(&db, doctor.id, Some(first.id), None, "2030-01-08", "09:00", "confirmed");
        seed_appointment(&db, doctor.id, Some(second.id), None, "2030-01-01", "10:00", "completed");
        seed_appointment(&db, doctor.id, None, Some(guest), "2030-01-09", "11:00", "cancelled");

        seed_review(&db, doctor.id, first.id, 5);
        seed_review(&db, doctor.id, second.id, 4);
        seed_review(&db, doctor.id, third.id, 2);

        let dashboard = DashboardService::new(db).doctor(doctor.id, today()).unwrap();
        assert_eq!(dashboard.total_appointments, 4);
        assert_eq!(dashboard.today_appointments, 1);
        assert_eq!(dashboard.pending_appointments, 1);
        assert_eq!(dashboard.unique_patients, 3);
        assert_eq!(dashboard.total_reviews, 3);
        assert!((dashboard.average_rating - 3.7).abs() < 1e-9);
        assert_eq!(dashboard.satisfaction_percentage, 67);
        assert_eq!(dashboard.total_prescriptions, 0);

        let upcoming: Vec<_> = dashboard.upcoming.iter().map(|a| a.date.as_str()).collect();
        assert_eq!(upcoming, vec!["2030-01-07", "2030-01-08"]);
    }

    #[test]
    fn empty_doctor_dashboard_is_zeroed() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let dashboard = DashboardService::new(db).doctor(doctor.id, today()).unwrap();
        assert_eq!(dashboard.average_rating, 0.0);
        assert_eq!(dashboard.satisfaction_percentage, 0);
        assert!(dashboard.upcoming.is_empty());
    }

    #[test]
    fn patient_dashboard_counts_only_upcoming_open_appointments() {
        let db = Database::open_in_memory().unwrap();
        let doctor = seed_doctor(&db, "doc@example.com");
        let patient = seed_patient(&db, "pat@example.com");
        seed_appointment(&db, doctor.id, Some(patient.id), None, "2030-01-08", "09:00", "pending");
        seed_appointment(
            &db,
            doctor.id,
            Some(patient.id),
            None,
            "2030-01-09",
            "09:00",
            "cancelled",
        );
        seed_appointment(
            &db,
            doctor.id,
            Some(patient.id),
            None,
            "2029-12-01",
            "09:00",
            "completed",
        );

        let dashboard = DashboardService::new(db).patient(patient.id, today()).unwrap();
        assert_eq!(dashboard.total_appointments, 3);
        assert_eq!(dashboard.upcoming_appointments, 1);
        assert_eq!(dashboard.medical_records, 0);
        assert_eq!(dashboard.active_prescriptions, 0);
        assert_eq!(dashboard.consultations, 0);
    }
}
