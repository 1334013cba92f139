//! Input validation utilities.
//!
//! Validators take the raw optional request value, record a field-level message on
//! failure and return the parsed value on success. Handlers run every check first and
//! then call [`ValidationErrors::into_result`], so a client sees all problems at once.

use crate::{ClinicError, ClinicResult};
use chrono::{NaiveDate, NaiveTime};
use clinic_types::{EmailAddress, NonEmptyText, PhoneNumber, TextError};
use std::collections::BTreeMap;

/// Wire format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for times of day.
pub const TIME_FORMAT: &str = "%H:%M";

/// Default length limit for short text columns.
pub const SHORT_TEXT_MAX: usize = 255;

/// Length limit for free-text columns (notes, descriptions, message bodies).
pub const LONG_TEXT_MAX: usize = 5000;

/// Field name to messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// `Ok(())` when nothing was recorded, otherwise `ClinicError::Validation`.
    pub fn into_result(self) -> ClinicResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClinicError::Validation(self))
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<NonEmptyText> {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    };
    match NonEmptyText::bounded(raw, max) {
        Ok(text) => Some(text),
        Err(TextError::TooLong { max }) => {
            errors.add(
                field,
                format!("The {} may not be greater than {max} characters.", label(field)),
            );
            None
        }
        Err(_) => {
            errors.add(field, format!("The {} field is required.", label(field)));
            None
        }
    }
}

/// Blank input counts as absent.
pub fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    if blank(value) {
        return None;
    }
    required_text(errors, field, value, max).map(NonEmptyText::into_inner)
}

pub fn required_email(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<EmailAddress> {
    if blank(value) {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    }
    match EmailAddress::parse(value.unwrap_or_default()) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.add(
                field,
                format!("The {} must be a valid email address.", label(field)),
            );
            None
        }
    }
}

pub fn required_phone(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<PhoneNumber> {
    if blank(value) {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    }
    optional_phone(errors, field, value)
}

pub fn optional_phone(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<PhoneNumber> {
    if blank(value) {
        return None;
    }
    match PhoneNumber::parse(value.unwrap_or_default()) {
        Ok(phone) => Some(phone),
        Err(_) => {
            errors.add(field, format!("The {} format is invalid.", label(field)));
            None
        }
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn required_date(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    if blank(value) {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    }
    optional_date(errors, field, value)
}

pub fn optional_date(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveDate> {
    if blank(value) {
        return None;
    }
    let parsed = parse_date(value.unwrap_or_default());
    if parsed.is_none() {
        errors.add(field, format!("The {} is not a valid date.", label(field)));
    }
    parsed
}

pub fn required_time(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<NaiveTime> {
    if blank(value) {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    }
    let parsed = parse_time(value.unwrap_or_default());
    if parsed.is_none() {
        errors.add(
            field,
            format!("The {} does not match the format HH:MM.", label(field)),
        );
    }
    parsed
}

pub fn required_id(errors: &mut ValidationErrors, field: &str, value: Option<i64>) -> Option<i64> {
    match value {
        None => {
            errors.add(field, format!("The {} field is required.", label(field)));
            None
        }
        Some(id) if id <= 0 => {
            errors.add(field, format!("The selected {} is invalid.", label(field)));
            None
        }
        Some(id) => Some(id),
    }
}

pub fn accepted(errors: &mut ValidationErrors, field: &str, value: Option<bool>) {
    if value != Some(true) {
        errors.add(field, format!("The {} must be accepted.", label(field)));
    }
}

pub fn non_negative(errors: &mut ValidationErrors, field: &str, value: Option<f64>) -> Option<f64> {
    let value = value?;
    if !value.is_finite() || value < 0.0 {
        errors.add(field, format!("The {} must be at least 0.", label(field)));
        return None;
    }
    Some(value)
}

pub fn int_between(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<i64>,
    min: i64,
    max: i64,
) -> Option<i64> {
    let value = value?;
    if !(min..=max).contains(&value) {
        errors.add(
            field,
            format!("The {} must be between {min} and {max}.", label(field)),
        );
        return None;
    }
    Some(value)
}

/// Checks a new password and its confirmation. Returns the password when acceptable.
pub fn new_password<'a>(
    errors: &mut ValidationErrors,
    password: Option<&'a str>,
    confirmation: Option<&str>,
) -> Option<&'a str> {
    const MIN_LEN: usize = 8;

    let Some(password) = password.filter(|p| !p.is_empty()) else {
        errors.add("password", "The password field is required.");
        return None;
    };
    if password.chars().count() < MIN_LEN {
        errors.add(
            "password",
            format!("The password must be at least {MIN_LEN} characters."),
        );
        return None;
    }
    if confirmation != Some(password) {
        errors.add("password", "The password confirmation does not match.");
        return None;
    }
    Some(password)
}

/// Accepts one of `allowed` (case-insensitive) and returns it lower-cased.
pub fn one_of(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    allowed: &[&str],
) -> Option<String> {
    if blank(value) {
        errors.add(field, format!("The {} field is required.", label(field)));
        return None;
    }
    let normalised = value.unwrap_or_default().trim().to_ascii_lowercase();
    if allowed.contains(&normalised.as_str()) {
        Some(normalised)
    } else {
        errors.add(field, format!("The selected {} is invalid.", label(field)));
        None
    }
}
