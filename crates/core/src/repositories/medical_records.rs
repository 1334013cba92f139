//! Medical records and their file attachments.
//!
//! Attachments live in the content-addressed [`AttachmentStore`]; the record row keeps the
//! hash plus the original name, media type and size. Identical uploads share one blob.
//! Blobs are never removed when a record is deleted or its attachment replaced, since
//! another record may reference the same content.

use crate::constants::RECORD_TYPES;
use crate::db::{exists, not_found, now_timestamp, Database};
use crate::ownership::{ensure_can_view, ensure_doctor_owns, Actor};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{Attachment, MedicalRecord};
use clinic_files::{AttachmentStore, FileMetadata, FilesError, ALLOWED_EXTENSIONS};
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const RECORD_SELECT: &str = "SELECT id, doctor_id, patient_id, title, record_type, description,
        record_date, file_hash, file_name, file_media_type, file_size, created_at, updated_at
    FROM medical_records";

/// An uploaded file as received from the client.
#[derive(Clone, Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Text fields of a create or update form, plus the optional upload.
#[derive(Clone, Debug, Default)]
pub struct MedicalRecordForm {
    pub patient_id: Option<String>,
    pub title: Option<String>,
    pub record_type: Option<String>,
    pub description: Option<String>,
    pub record_date: Option<String>,
    pub file: Option<Upload>,
}

/// Bytes of a stored attachment, ready to serve.
#[derive(Clone, Debug)]
pub struct RecordFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    let hash: Option<String> = row.get(7)?;
    let attachment = match hash {
        Some(hash) => Some(Attachment {
            hash,
            file_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            media_type: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            size_bytes: row.get::<_, Option<i64>>(10)?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(MedicalRecord {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        title: row.get(3)?,
        record_type: row.get(4)?,
        description: row.get(5)?,
        record_date: row.get(6)?,
        attachment,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn load_record(conn: &Connection, id: i64) -> ClinicResult<MedicalRecord> {
    conn.query_row(&format!("{RECORD_SELECT} WHERE id = ?1"), [id], record_from_row)
        .map_err(not_found("medical record"))
}

/// Validated form ready to be written.
struct RecordFields {
    patient_id: i64,
    title: String,
    record_type: String,
    description: Option<String>,
    record_date: String,
}

fn upload_error(store: &AttachmentStore, error: FilesError) -> String {
    match error {
        FilesError::FileTooLarge { max, .. } => {
            format!("The file may not be greater than {} kilobytes.", max / 1024)
        }
        FilesError::EmptyFile => "The file failed to upload.".into(),
        FilesError::UnsupportedFileType(_) | FilesError::InvalidPath(_) => format!(
            "The file must be a file of type: {}.",
            ALLOWED_EXTENSIONS.join(", ")
        ),
        other => {
            tracing::warn!(
                error = %other,
                root = %store.root_directory().display(),
                "upload rejected"
            );
            "The file failed to upload.".into()
        }
    }
}

#[derive(Clone, Debug)]
pub struct MedicalRecordService {
    db: Database,
    files: Arc<AttachmentStore>,
}

impl MedicalRecordService {
    pub fn new(db: Database, files: Arc<AttachmentStore>) -> Self {
        Self { db, files }
    }

    fn validate(&self, conn: &Connection, form: &MedicalRecordForm) -> ClinicResult<RecordFields> {
        let mut errors = ValidationErrors::new();

        let raw_patient = form.patient_id.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let patient_id = match raw_patient {
            None => {
                errors.add("patient_id", "The patient id field is required.");
                None
            }
            Some(raw) => {
                let id = raw.parse::<i64>().ok().filter(|id| *id > 0);
                let found = match id {
                    Some(id) => exists(conn, "patients", id)?,
                    None => false,
                };
                if !found {
                    errors.add("patient_id", "The selected patient id is invalid.");
                }
                id.filter(|_| found)
            }
        };
        let title =
            validation::required_text(&mut errors, "title", form.title.as_deref(), SHORT_TEXT_MAX);
        let record_type = validation::one_of(
            &mut errors,
            "record_type",
            form.record_type.as_deref(),
            RECORD_TYPES,
        );
        let description = validation::optional_text(
            &mut errors,
            "description",
            form.description.as_deref(),
            LONG_TEXT_MAX,
        );
        let record_date =
            validation::required_date(&mut errors, "record_date", form.record_date.as_deref());
        if let Some(upload) = &form.file {
            if let Err(e) = self.files.validate(&upload.file_name, upload.bytes.len() as u64) {
                errors.add("file", upload_error(&self.files, e));
            }
        }
        errors.into_result()?;

        let (Some(patient_id), Some(title), Some(record_type), Some(record_date)) =
            (patient_id, title, record_type, record_date)
        else {
            return Err(ClinicError::InvalidInput("record fields missing".into()));
        };
        Ok(RecordFields {
            patient_id,
            title: title.into_inner(),
            record_type,
            description,
            record_date: validation::format_date(record_date),
        })
    }

    fn store(&self, upload: Option<&Upload>) -> ClinicResult<Option<FileMetadata>> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        let metadata = self.files.add(&upload.file_name, &upload.bytes)?;
        tracing::info!(hash = %metadata.hash, size = metadata.size_bytes, "attachment stored");
        Ok(Some(metadata))
    }

    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for bad fields or an unacceptable file, and
    /// `ClinicError::Files` when the upload cannot be written to disk.
    pub fn create(&self, doctor_id: i64, form: &MedicalRecordForm) -> ClinicResult<MedicalRecord> {
        let fields = {
            let conn = self.db.lock()?;
            self.validate(&conn, form)?
        };
        // Hashing and writing the upload happen without holding the connection.
        let file = self.store(form.file.as_ref())?;

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO medical_records (doctor_id, patient_id, title, record_type, description,
                record_date, file_hash, file_name, file_media_type, file_size, created_at,
                updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                doctor_id,
                fields.patient_id,
                fields.title,
                fields.record_type,
                fields.description,
                fields.record_date,
                file.as_ref().map(|f| f.hash.as_str()),
                file.as_ref().map(|f| f.original_filename.as_str()),
                file.as_ref().map(|f| f.media_type.as_str()),
                file.as_ref().map(|f| f.size_bytes as i64),
                now_timestamp(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(
            record_id = id,
            doctor_id,
            patient_id = fields.patient_id,
            "medical record created"
        );
        load_record(&conn, id)
    }

    /// Replace a record's fields. A new file replaces the attachment; no file keeps it.
    pub fn update(
        &self,
        doctor_id: i64,
        id: i64,
        form: &MedicalRecordForm,
    ) -> ClinicResult<MedicalRecord> {
        let fields = {
            let conn = self.db.lock()?;
            let existing = load_record(&conn, id)?;
            ensure_doctor_owns(existing.doctor_id, doctor_id)?;
            self.validate(&conn, form)?
        };
        let file = self.store(form.file.as_ref())?;

        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE medical_records SET patient_id = ?1, title = ?2, record_type = ?3,
                description = ?4, record_date = ?5, updated_at = ?6
             WHERE id = ?7 AND doctor_id = ?8",
            params![
                fields.patient_id,
                fields.title,
                fields.record_type,
                fields.description,
                fields.record_date,
                now_timestamp(),
                id,
                doctor_id,
            ],
        )?;
        if changed == 0 {
            return Err(ClinicError::NotFound("medical record"));
        }
        if let Some(file) = &file {
            tx.execute(
                "UPDATE medical_records SET file_hash = ?1, file_name = ?2, file_media_type = ?3,
                    file_size = ?4
                 WHERE id = ?5",
                params![
                    file.hash,
                    file.original_filename.as_str(),
                    file.media_type.as_str(),
                    file.size_bytes as i64,
                    id,
                ],
            )?;
        }
        tx.commit()?;
        if file.is_some() {
            tracing::info!(record_id = id, doctor_id, "medical record attachment replaced");
        }
        load_record(&conn, id)
    }

    pub fn delete(&self, doctor_id: i64, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        let existing = load_record(&conn, id)?;
        ensure_doctor_owns(existing.doctor_id, doctor_id)?;
        conn.execute("DELETE FROM medical_records WHERE id = ?1", [id])?;
        tracing::info!(record_id = id, doctor_id, "medical record deleted");
        Ok(())
    }

    pub fn get(&self, actor: Actor, id: i64) -> ClinicResult<MedicalRecord> {
        let conn = self.db.lock()?;
        let record = load_record(&conn, id)?;
        ensure_can_view(actor, record.doctor_id, Some(record.patient_id))?;
        Ok(record)
    }

    /// Records written by `doctor_id`, optionally for a single patient.
    pub fn list_for_doctor(
        &self,
        doctor_id: i64,
        patient_id: Option<i64>,
    ) -> ClinicResult<Vec<MedicalRecord>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT} WHERE doctor_id = ?1 AND (?2 IS NULL OR patient_id = ?2)
             ORDER BY record_date DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![doctor_id, patient_id], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_for_patient(&self, patient_id: i64) -> ClinicResult<Vec<MedicalRecord>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT} WHERE patient_id = ?1 ORDER BY record_date DESC, id DESC"
        ))?;
        let rows = stmt.query_map([patient_id], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Attachment bytes for the owning doctor or the record's patient.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound("attachment")` when the record has no file.
    pub fn download(&self, actor: Actor, id: i64) -> ClinicResult<RecordFile> {
        let record = self.get(actor, id)?;
        let attachment = record.attachment.ok_or(ClinicError::NotFound("attachment"))?;
        let bytes = self.files.read(&attachment.hash).map_err(|e| match e {
            FilesError::NotFound(_) => ClinicError::NotFound("attachment"),
            other => ClinicError::Files(other),
        })?;
        Ok(RecordFile {
            file_name: attachment.file_name,
            media_type: attachment.media_type,
            bytes,
        })
    }
}
