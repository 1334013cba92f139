//! Fixtures shared by the unit tests.

use crate::auth::AuthService;
use crate::Database;
use api_shared::{Doctor, Patient, RegisterDoctorReq, RegisterPatientReq};
use rusqlite::params;

pub(crate) fn doctor_req(email: &str) -> RegisterDoctorReq {
    RegisterDoctorReq {
        name: Some("Dr Ada Lovelace".into()),
        email: Some(email.into()),
        password: Some("correct horse".into()),
        password_confirmation: Some("correct horse".into()),
        specialization: Some("Cardiology".into()),
        ..Default::default()
    }
}

pub(crate) fn patient_req(email: &str) -> RegisterPatientReq {
    RegisterPatientReq {
        name: Some("Grace Hopper".into()),
        email: Some(email.into()),
        password: Some("battery staple".into()),
        password_confirmation: Some("battery staple".into()),
        phone: Some("+44 20 7946 0000".into()),
        ..Default::default()
    }
}

pub(crate) fn seed_doctor(db: &Database, email: &str) -> Doctor {
    AuthService::new(db.clone(), None)
        .create_doctor(&doctor_req(email))
        .unwrap()
}

pub(crate) fn seed_patient(db: &Database, email: &str) -> Patient {
    AuthService::new(db.clone(), None)
        .register_patient(&patient_req(email))
        .unwrap()
        .patient
}

pub(crate) fn seed_guest(db: &Database) -> i64 {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO guests (name, email, phone, date_of_birth, created_at)
         VALUES ('Walk In', 'walkin@example.com', '5551234567', '1980-01-01',
                 '2026-01-01T00:00:00Z')",
        [],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub(crate) fn seed_appointment(
    db: &Database,
    doctor_id: i64,
    patient_id: Option<i64>,
    guest_id: Option<i64>,
    date: &str,
    time: &str,
    status: &str,
) -> i64 {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO appointments (doctor_id, patient_id, guest_id, name, email, date, time,
                                   status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'Someone', 'someone@example.com', ?4, ?5, ?6,
                 '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        params![doctor_id, patient_id, guest_id, date, time, status],
    )
    .unwrap();
    conn.last_insert_rowid()
}
