//! Prescriptions and their medicine/test line items.
//!
//! A prescription is written together with its line items in one transaction. Updates may
//! replace either list of line items wholesale. Bulk actions apply only to prescriptions
//! the calling doctor owns and silently skip the rest.

use crate::db::{not_found, now_timestamp, Database};
use crate::identity::{resolve_subject, SubjectRef};
use crate::ownership::{ensure_can_view, ensure_doctor_owns, Actor};
use crate::repositories::consultations::check_doctor_appointment;
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{
    BulkPrescriptionReq, BulkPrescriptionRes, CreatePrescriptionReq, Prescription,
    PrescriptionMedicine, PrescriptionMedicineReq, PrescriptionTest, PrescriptionTestReq,
    UpdatePrescriptionReq,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const PRESCRIPTION_SELECT: &str = "SELECT id, doctor_id, patient_id, guest_id, appointment_id,
        diagnosis, notes, prescribed_date, valid_until, is_active, created_at, updated_at
    FROM prescriptions";

/// Action applied by [`PrescriptionService::bulk_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
}

impl BulkAction {
    pub const ALL: [&'static str; 3] = ["activate", "deactivate", "delete"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "activate" => Some(BulkAction::Activate),
            "deactivate" => Some(BulkAction::Deactivate),
            "delete" => Some(BulkAction::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::Activate => "activate",
            BulkAction::Deactivate => "deactivate",
            BulkAction::Delete => "delete",
        }
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        guest_id: row.get(3)?,
        appointment_id: row.get(4)?,
        diagnosis: row.get(5)?,
        notes: row.get(6)?,
        prescribed_date: row.get(7)?,
        valid_until: row.get(8)?,
        is_active: row.get(9)?,
        medicines: Vec::new(),
        tests: Vec::new(),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn attach_items(conn: &Connection, mut prescription: Prescription) -> ClinicResult<Prescription> {
    let mut stmt = conn.prepare(
        "SELECT id, medicine_id, medicine_name, dosage, frequency, duration, instructions
         FROM prescription_medicines WHERE prescription_id = ?1 ORDER BY id",
    )?;
    prescription.medicines = stmt
        .query_map([prescription.id], |row| {
            Ok(PrescriptionMedicine {
                id: row.get(0)?,
                medicine_id: row.get(1)?,
                name: row.get(2)?,
                dosage: row.get(3)?,
                frequency: row.get(4)?,
                duration: row.get(5)?,
                instructions: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, test_id, test_name, instructions
         FROM prescription_tests WHERE prescription_id = ?1 ORDER BY id",
    )?;
    prescription.tests = stmt
        .query_map([prescription.id], |row| {
            Ok(PrescriptionTest {
                id: row.get(0)?,
                test_id: row.get(1)?,
                name: row.get(2)?,
                instructions: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(prescription)
}

fn load_header(conn: &Connection, id: i64) -> ClinicResult<Prescription> {
    conn.query_row(
        &format!("{PRESCRIPTION_SELECT} WHERE id = ?1"),
        [id],
        prescription_from_row,
    )
    .map_err(not_found("prescription"))
}

fn load_prescription(conn: &Connection, id: i64) -> ClinicResult<Prescription> {
    let header = load_header(conn, id)?;
    attach_items(conn, header)
}

// ============================================================================
// LINE ITEM VALIDATION
// ============================================================================

struct MedicineLine {
    medicine_id: Option<i64>,
    name: String,
    dosage: String,
    frequency: String,
    duration: String,
    instructions: Option<String>,
}

struct TestLine {
    test_id: Option<i64>,
    name: String,
    instructions: Option<String>,
}

/// Catalogue name for `id` in `table`, or an error on `field` when it does not exist.
fn catalogue_name(
    conn: &Connection,
    errors: &mut ValidationErrors,
    table: &str,
    field: &str,
    label: &str,
    id: Option<i64>,
) -> ClinicResult<(Option<i64>, Option<String>)> {
    let Some(id) = id else {
        return Ok((None, None));
    };
    let name: Option<String> = conn
        .query_row(&format!("SELECT name FROM {table} WHERE id = ?1"), [id], |row| row.get(0))
        .optional()?;
    match name {
        Some(name) => Ok((Some(id), Some(name))),
        None => {
            errors.add(field, format!("The selected {label} is invalid."));
            Ok((None, None))
        }
    }
}

fn validate_medicines(
    conn: &Connection,
    errors: &mut ValidationErrors,
    items: &[PrescriptionMedicineReq],
) -> ClinicResult<Vec<MedicineLine>> {
    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let key = |field: &str| format!("medicines.{index}.{field}");
        let (medicine_id, catalogue) = catalogue_name(
            conn,
            errors,
            "medicines",
            &key("medicine_id"),
            "medicine id",
            item.medicine_id,
        )?;
        // The catalogue name stands in when the doctor leaves the name blank.
        let name_input = item
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(catalogue.as_deref());
        let name = validation::required_text(errors, &key("name"), name_input, SHORT_TEXT_MAX);
        let dosage = validation::required_text(
            errors,
            &key("dosage"),
            item.dosage.as_deref(),
            SHORT_TEXT_MAX,
        );
        let frequency = validation::required_text(
            errors,
            &key("frequency"),
            item.frequency.as_deref(),
            SHORT_TEXT_MAX,
        );
        let duration = validation::required_text(
            errors,
            &key("duration"),
            item.duration.as_deref(),
            SHORT_TEXT_MAX,
        );
        let instructions = validation::optional_text(
            errors,
            &key("instructions"),
            item.instructions.as_deref(),
            LONG_TEXT_MAX,
        );

        if let (Some(name), Some(dosage), Some(frequency), Some(duration)) =
            (name, dosage, frequency, duration)
        {
            lines.push(MedicineLine {
                medicine_id,
                name: name.into_inner(),
                dosage: dosage.into_inner(),
                frequency: frequency.into_inner(),
                duration: duration.into_inner(),
                instructions,
            });
        }
    }
    Ok(lines)
}

fn validate_tests(
    conn: &Connection,
    errors: &mut ValidationErrors,
    items: &[PrescriptionTestReq],
) -> ClinicResult<Vec<TestLine>> {
    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let key = |field: &str| format!("tests.{index}.{field}");
        let (test_id, catalogue) = catalogue_name(
            conn,
            errors,
            "tests",
            &key("test_id"),
            "test id",
            item.test_id,
        )?;
        let name_input = item
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(catalogue.as_deref());
        let name = validation::required_text(errors, &key("name"), name_input, SHORT_TEXT_MAX);
        let instructions = validation::optional_text(
            errors,
            &key("instructions"),
            item.instructions.as_deref(),
            LONG_TEXT_MAX,
        );
        if let Some(name) = name {
            lines.push(TestLine {
                test_id,
                name: name.into_inner(),
                instructions,
            });
        }
    }
    Ok(lines)
}

fn insert_lines(
    conn: &Connection,
    prescription_id: i64,
    medicines: &[MedicineLine],
    tests: &[TestLine],
) -> rusqlite::Result<()> {
    for line in medicines {
        conn.execute(
            "INSERT INTO prescription_medicines (prescription_id, medicine_id, medicine_name,
                dosage, frequency, duration, instructions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                prescription_id,
                line.medicine_id,
                line.name,
                line.dosage,
                line.frequency,
                line.duration,
                line.instructions,
            ],
        )?;
    }
    for line in tests {
        conn.execute(
            "INSERT INTO prescription_tests (prescription_id, test_id, test_name, instructions)
             VALUES (?1, ?2, ?3, ?4)",
            params![prescription_id, line.test_id, line.name, line.instructions],
        )?;
    }
    Ok(())
}

fn count_lines(conn: &Connection, table: &str, prescription_id: i64) -> ClinicResult<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE prescription_id = ?1"),
        [prescription_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

const NO_LINE_ITEMS: &str = "At least one medicine or test is required.";

// ============================================================================
// PRESCRIPTION SERVICE
// ============================================================================

#[derive(Clone, Debug)]
pub struct PrescriptionService {
    db: Database,
}

impl PrescriptionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write a prescription and its line items in one transaction.
    ///
    /// # Arguments
    ///
    /// * `doctor_id` - The prescribing doctor
    /// * `req` - Request; `patient_id` is `guest_<id>` for a guest, otherwise a patient id
    /// * `today` - Prescribed date, and the earliest allowed `valid_until`
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for bad fields, unknown subjects or catalogue
    /// entries, and when no line item is given.
    pub fn create(
        &self,
        doctor_id: i64,
        req: &CreatePrescriptionReq,
        today: NaiveDate,
    ) -> ClinicResult<Prescription> {
        let mut conn = self.db.lock()?;
        let mut errors = ValidationErrors::new();
        let subject = resolve_subject(&conn, &mut errors, "patient_id", req.patient_id.as_deref())?;
        let appointment_id = check_doctor_appointment(
            &conn,
            &mut errors,
            doctor_id,
            req.appointment_id,
        )?;
        let diagnosis = validation::required_text(
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
        let valid_until = validation::optional_date(
            &mut errors,
            "valid_until",
            req.valid_until.as_deref(),
        );
        if valid_until.is_some_and(|d| d < today) {
            errors.add("valid_until", "The valid until must be a date after or equal to today.");
        }
        let medicines = validate_medicines(&conn, &mut errors, &req.medicines)?;
        let tests = validate_tests(&conn, &mut errors, &req.tests)?;
        if req.medicines.is_empty() && req.tests.is_empty() {
            errors.add("medicines", NO_LINE_ITEMS);
        }
        errors.into_result()?;
        let (Some(subject), Some(diagnosis)) = (subject, diagnosis) else {
            return Err(ClinicError::InvalidInput("prescription fields missing".into()));
        };

        let now = now_timestamp();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO prescriptions (doctor_id, patient_id, guest_id, appointment_id, diagnosis,
                notes, prescribed_date, valid_until, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
            params![
                doctor_id,
                subject.patient_id(),
                subject.guest_id(),
                appointment_id,
                diagnosis.as_str(),
                notes,
                validation::format_date(today),
                valid_until.map(validation::format_date),
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_lines(&tx, id, &medicines, &tests)?;
        tx.commit()?;

        tracing::info!(
            prescription_id = id,
            doctor_id,
            subject = %subject,
            medicines = medicines.len(),
            tests = tests.len(),
            "prescription created"
        );
        load_prescription(&conn, id)
    }

    pub fn get(&self, actor: Actor, id: i64) -> ClinicResult<Prescription> {
        let conn = self.db.lock()?;
        let header = load_header(&conn, id)?;
        ensure_can_view(actor, header.doctor_id, header.patient_id)?;
        attach_items(&conn, header)
    }

    pub fn list_for_doctor(&self, doctor_id: i64) -> ClinicResult<Vec<Prescription>> {
        self.list_where("doctor_id", doctor_id)
    }

    pub fn list_for_patient(&self, patient_id: i64) -> ClinicResult<Vec<Prescription>> {
        self.list_where("patient_id", patient_id)
    }

    /// All prescriptions for a subject identifier, restricted to `doctor_id`'s own.
    pub fn list_for_subject(
        &self,
        doctor_id: i64,
        subject: SubjectRef,
    ) -> ClinicResult<Vec<Prescription>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{PRESCRIPTION_SELECT}
             WHERE doctor_id = ?1 AND (patient_id = ?2 OR guest_id = ?3)
             ORDER BY prescribed_date DESC, id DESC"
        ))?;
        let headers = stmt
            .query_map(
                params![doctor_id, subject.patient_id(), subject.guest_id()],
                prescription_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        headers.into_iter().map(|p| attach_items(&conn, p)).collect()
    }

    fn list_where(&self, column: &str, id: i64) -> ClinicResult<Vec<Prescription>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{PRESCRIPTION_SELECT} WHERE {column} = ?1 ORDER BY prescribed_date DESC, id DESC"
        ))?;
        let headers = stmt
            .query_map([id], prescription_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        headers.into_iter().map(|p| attach_items(&conn, p)).collect()
    }

    /// Partial update. Provided `medicines`/`tests` lists replace the stored line items.
    pub fn update(
        &self,
        doctor_id: i64,
        id: i64,
        req: &UpdatePrescriptionReq,
        today: NaiveDate,
    ) -> ClinicResult<Prescription> {
        let mut conn = self.db.lock()?;
        let existing = load_header(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;

        let mut errors = ValidationErrors::new();
        let diagnosis = match req.diagnosis.as_deref() {
            Some(raw) => validation::required_text(
                &mut errors,
                "diagnosis",
                Some(raw),
                LONG_TEXT_MAX,
            ),
            None => None,
        };
        let notes = validation::optional_text(
            &mut errors,
            "notes",
            req.notes.as_deref(),
            LONG_TEXT_MAX,
        );
        let valid_until = validation::optional_date(
            &mut errors,
            "valid_until",
            req.valid_until.as_deref(),
        );
        if valid_until.is_some_and(|d| d < today) {
            errors.add("valid_until", "The valid until must be a date after or equal to today.");
        }
        let medicines = match &req.medicines {
            Some(items) => Some(validate_medicines(&conn, &mut errors, items)?),
            None => None,
        };
        let tests = match &req.tests {
            Some(items) => Some(validate_tests(&conn, &mut errors, items)?),
            None => None,
        };
        let medicine_count = match &req.medicines {
            Some(items) => items.len(),
            None => count_lines(&conn, "prescription_medicines", id)?,
        };
        let test_count = match &req.tests {
            Some(items) => items.len(),
            None => count_lines(&conn, "prescription_tests", id)?,
        };
        if medicine_count + test_count == 0 {
            errors.add("medicines", NO_LINE_ITEMS);
        }
        errors.into_result()?;

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE prescriptions SET
                diagnosis = COALESCE(?1, diagnosis),
                notes = COALESCE(?2, notes),
                valid_until = COALESCE(?3, valid_until),
                is_active = COALESCE(?4, is_active),
                updated_at = ?5
             WHERE id = ?6",
            params![
                diagnosis.as_ref().map(|d| d.as_str()),
                notes,
                valid_until.map(validation::format_date),
                req.is_active,
                now_timestamp(),
                id,
            ],
        )?;
        if let Some(lines) = &medicines {
            tx.execute("DELETE FROM prescription_medicines WHERE prescription_id = ?1", [id])?;
            insert_lines(&tx, id, lines, &[])?;
        }
        if let Some(lines) = &tests {
            tx.execute("DELETE FROM prescription_tests WHERE prescription_id = ?1", [id])?;
            insert_lines(&tx, id, &[], lines)?;
        }
        tx.commit()?;

        tracing::info!(prescription_id = id, doctor_id, "prescription updated");
        load_prescription(&conn, id)
    }

    /// Delete a prescription; line items go with it.
    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let existing = load_header(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute("DELETE FROM prescriptions WHERE id = ?1", [id])?;
        tracing::info!(prescription_id = id, doctor_id, "prescription deleted");
        Ok(())
    }

    /// Apply `activate`, `deactivate` or `delete` to the listed prescriptions the doctor owns.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` when `ids` is empty or `action` is unknown.
    pub fn bulk_update(
        &self,
        doctor_id: i64,
        req: &BulkPrescriptionReq,
    ) -> ClinicResult<BulkPrescriptionRes> {
        let mut errors = ValidationErrors::new();
        if req.ids.is_empty() {
            errors.add("ids", "The ids field is required.");
        }
        let action = validation::one_of(
            &mut errors,
            "action",
            req.action.as_deref(),
            &BulkAction::ALL,
        )
            .and_then(|a| BulkAction::parse(&a));
        errors.into_result()?;
        let Some(action) = action else {
            return Err(ClinicError::field("action", "The selected action is invalid."));
        };

        let ids: BTreeSet<i64> = req.ids.iter().copied().collect();
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let now = now_timestamp();
        let mut affected = 0;
        for id in &ids {
            affected += match action {
                BulkAction::Activate | BulkAction::Deactivate => tx.execute(
                    "UPDATE prescriptions SET is_active = ?1, updated_at = ?2
                     WHERE id = ?3 AND doctor_id = ?4",
                    params![action == BulkAction::Activate, now, id, doctor_id],
                )?,
                BulkAction::Delete => tx.execute(
                    "DELETE FROM prescriptions WHERE id = ?1 AND doctor_id = ?2",
                    params![id, doctor_id],
                )?,
            };
        }
        tx.commit()?;

        tracing::info!(
            doctor_id,
            action = action.as_str(),
            requested = ids.len(),
            affected,
            "bulk prescription update"
        );
        Ok(BulkPrescriptionRes {
            action: action.as_str().into(),
            affected,
        })
    }
}
