//! Appointment booking for registered patients and walk-in guests.
//!
//! One public endpoint accepts both kinds of booking. The caller's bearer token decides
//! the path: a token that resolves to a patient books as that patient, anything else books
//! as a guest and must supply contact details. Each path writes inside a single SQLite
//! transaction, so a failure leaves neither a guest row nor an appointment behind.

use crate::constants::BOOKING_FAILED_MESSAGE;
use crate::db::{now_timestamp, Database};
use crate::repositories::appointments::load_appointment;
use crate::repositories::guests::{insert_guest, NewGuest};
use crate::repositories::{doctors, patients};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{BookAppointmentReq, BookAppointmentRes, Patient};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};

/// Who the booking is for, as decided by the request's credentials.
#[derive(Clone, Copy, Debug)]
pub enum Booker<'a> {
    Patient(&'a Patient),
    Guest,
}

impl Booker<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Booker::Patient(_) => "patient",
            Booker::Guest => "guest",
        }
    }
}

/// Fields shared by both booking paths, already validated.
struct Slot {
    doctor_id: i64,
    date: String,
    time: String,
    message: Option<String>,
}

fn validate_slot(
    conn: &Connection,
    errors: &mut ValidationErrors,
    req: &BookAppointmentReq,
    today: NaiveDate,
) -> ClinicResult<Option<Slot>> {
    let doctor_id = validation::required_id(errors, "doctor_id", req.doctor_id);
    if let Some(id) = doctor_id {
        if doctors::doctor_active(conn, id)? != Some(true) {
            errors.add("doctor_id", "The selected doctor id is invalid.");
        }
    }

    let date = validation::required_date(errors, "date", req.date.as_deref());
    if date.is_some_and(|d| d < today) {
        errors.add("date", "The date must be a date after or equal to today.");
    }
    let time: Option<NaiveTime> = validation::required_time(errors, "time", req.time.as_deref());
    validation::accepted(errors, "terms", req.terms);
    let message = validation::optional_text(
        errors,
        "message",
        req.message.as_deref(),
        LONG_TEXT_MAX,
    );

    Ok(match (doctor_id, date, time) {
        (Some(doctor_id), Some(date), Some(time)) => Some(Slot {
            doctor_id,
            date: validation::format_date(date),
            time: validation::format_time(time),
            message,
        }),
        _ => None,
    })
}

struct NewAppointment<'a> {
    slot: &'a Slot,
    patient_id: Option<i64>,
    guest_id: Option<i64>,
    name: &'a str,
    email: &'a str,
    phone: Option<&'a str>,
}

fn insert_appointment(conn: &Connection, new: &NewAppointment<'_>) -> rusqlite::Result<i64> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO appointments (doctor_id, patient_id, guest_id, name, email, phone, date,
                                   time, status, message, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10, ?10)",
        params![
            new.slot.doctor_id,
            new.patient_id,
            new.guest_id,
            new.name,
            new.email,
            new.phone,
            new.slot.date,
            new.slot.time,
            new.slot.message,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn booking_failed(e: rusqlite::Error) -> ClinicError {
    tracing::error!(error = %e, "{BOOKING_FAILED_MESSAGE}");
    ClinicError::BookingFailed(e)
}

#[derive(Clone, Debug)]
pub struct BookingService {
    db: Database,
}

impl BookingService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Book an appointment for whoever `booker` names.
    ///
    /// # Arguments
    ///
    /// * `booker` - The authenticated patient, or `Booker::Guest` for any other caller
    /// * `req` - Raw booking request
    /// * `today` - Current local date; bookings before it are rejected
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for bad input or a duplicate patient booking, and
    /// `ClinicError::BookingFailed` when the transaction cannot be written.
    pub fn book(
        &self,
        booker: Booker<'_>,
        req: &BookAppointmentReq,
        today: NaiveDate,
    ) -> ClinicResult<BookAppointmentRes> {
        let mut conn = self.db.lock()?;
        let appointment_id = match booker {
            Booker::Patient(patient) => book_as_patient(&mut conn, patient.id, req, today)?,
            Booker::Guest => book_as_guest(&mut conn, req, today)?,
        };
        let appointment = load_appointment(&conn, appointment_id)?;
        tracing::info!(
            appointment_id,
            doctor_id = appointment.doctor_id,
            booked_as = booker.as_str(),
            "appointment booked"
        );

        Ok(BookAppointmentRes {
            message: "Appointment booked successfully.".into(),
            booked_as: booker.as_str().into(),
            appointment,
        })
    }
}

fn book_as_patient(
    conn: &mut Connection,
    patient_id: i64,
    req: &BookAppointmentReq,
    today: NaiveDate,
) -> ClinicResult<i64> {
    let mut errors = ValidationErrors::new();
    let slot = validate_slot(conn, &mut errors, req, today)?;
    errors.into_result()?;
    let Some(slot) = slot else {
        return Err(ClinicError::InvalidInput("booking fields missing".into()));
    };

    // Contact details come from the stored profile, not the request.
    let patient = patients::load_patient(conn, patient_id)?;

    let duplicate: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM appointments
            WHERE patient_id = ?1 AND doctor_id = ?2 AND date = ?3 AND time = ?4
              AND status IN ('pending', 'confirmed'))",
        params![patient.id, slot.doctor_id, slot.date, slot.time],
        |row| row.get(0),
    )?;
    if duplicate == 1 {
        return Err(ClinicError::field(
            "time",
            "You already have an appointment with this doctor at the selected date and time.",
        ));
    }

    let tx = conn.transaction().map_err(booking_failed)?;
    let id = insert_appointment(
        &tx,
        &NewAppointment {
            slot: &slot,
            patient_id: Some(patient.id),
            guest_id: None,
            name: &patient.name,
            email: &patient.email,
            phone: patient.phone.as_deref(),
        },
    )
    .map_err(booking_failed)?;
    tx.commit().map_err(booking_failed)?;
    Ok(id)
}

fn book_as_guest(
    conn: &mut Connection,
    req: &BookAppointmentReq,
    today: NaiveDate,
) -> ClinicResult<i64> {
    let mut errors = ValidationErrors::new();
    let name = validation::required_text(&mut errors, "name", req.name.as_deref(), SHORT_TEXT_MAX);
    let email = validation::required_email(&mut errors, "email", req.email.as_deref());
    let phone = validation::required_phone(&mut errors, "phone", req.phone.as_deref());
    let date_of_birth =
        validation::required_date(&mut errors, "date_of_birth", req.date_of_birth.as_deref());
    if date_of_birth.is_some_and(|d| d >= today) {
        errors.add("date_of_birth", "The date of birth must be a date before today.");
    }
    let gender = validation::optional_text(&mut errors, "gender", req.gender.as_deref(), 20);
    let address =
        validation::optional_text(&mut errors, "address", req.address.as_deref(), LONG_TEXT_MAX);
    let slot = validate_slot(conn, &mut errors, req, today)?;
    errors.into_result()?;

    let (Some(name), Some(email), Some(phone), Some(date_of_birth), Some(slot)) =
        (name, email, phone, date_of_birth, slot)
    else {
        return Err(ClinicError::InvalidInput("booking fields missing".into()));
    };
    let guest = NewGuest {
        name: name.into_inner(),
        email: email.as_str().to_string(),
        phone: phone.as_str().to_string(),
        date_of_birth: validation::format_date(date_of_birth),
        gender,
        address,
    };

    let tx = conn.transaction().map_err(booking_failed)?;
    let guest_id = insert_guest(&tx, &guest).map_err(booking_failed)?;
    let id = insert_appointment(
        &tx,
        &NewAppointment {
            slot: &slot,
            patient_id: None,
            guest_id: Some(guest_id),
            name: &guest.name,
            email: &guest.email,
            phone: Some(guest.phone.as_str()),
        },
    )
    .map_err(booking_failed)?;
    tx.commit().map_err(booking_failed)?;
    Ok(id)
}
