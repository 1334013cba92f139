//! Patient-or-guest identifier strings.
//!
//! Doctors address the subject of a consultation or prescription with one string field:
//! `guest_<id>` selects a guest, a bare integer selects a registered patient.

use crate::constants::GUEST_ID_PREFIX;
use crate::db::exists;
use crate::validation::ValidationErrors;
use crate::ClinicResult;
use rusqlite::Connection;
use std::fmt;

/// Resolved subject of a clinical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubjectRef {
    Patient(i64),
    Guest(i64),
}

impl SubjectRef {
    /// Parse an identifier string. Returns `None` for anything that is not `guest_<n>` or
    /// `<n>` with `n > 0`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (guest, digits) = match raw.strip_prefix(GUEST_ID_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id: i64 = digits.parse().ok().filter(|id| *id > 0)?;
        Some(if guest {
            SubjectRef::Guest(id)
        } else {
            SubjectRef::Patient(id)
        })
    }

    pub fn patient_id(self) -> Option<i64> {
        match self {
            SubjectRef::Patient(id) => Some(id),
            SubjectRef::Guest(_) => None,
        }
    }

    pub fn guest_id(self) -> Option<i64> {
        match self {
            SubjectRef::Guest(id) => Some(id),
            SubjectRef::Patient(_) => None,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Patient(id) => write!(f, "{id}"),
            SubjectRef::Guest(id) => write!(f, "{GUEST_ID_PREFIX}{id}"),
        }
    }
}

/// Parse `raw` and check the referenced row exists, recording a field error otherwise.
pub(crate) fn resolve_subject(
    conn: &Connection,
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
) -> ClinicResult<Option<SubjectRef>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        errors.add(field, format!("The {} field is required.", field.replace('_', " ")));
        return Ok(None);
    };
    let invalid = format!("The selected {} is invalid.", field.replace('_', " "));
    let Some(subject) = SubjectRef::parse(raw) else {
        errors.add(field, invalid);
        return Ok(None);
    };

    let found = match subject {
        SubjectRef::Patient(id) => exists(conn, "patients", id)?,
        SubjectRef::Guest(id) => exists(conn, "guests", id)?,
    };
    if !found {
        errors.add(field, invalid);
        return Ok(None);
    }
    Ok(Some(subject))
}
