//! # Clinic Core
//!
//! Core business logic for the clinic and telehealth backend.
//!
//! This crate owns the SQLite schema and every rule the system enforces:
//! - Doctor and patient accounts, passwords and bearer tokens ([`auth`])
//! - Weekly schedules, time slots and transactional booking for patients and guests
//! - Appointments, consultations, medical records with attachments, prescriptions
//! - Reviews, dashboards, blogs, galleries, messages, catalogue, cart and subscriptions
//!
//! **No API concerns**: HTTP routing, extractors and status codes belong in `api-rest`.
//! Services take validated wire types from `api-shared` and return them.

pub mod auth;
pub mod booking;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod identity;
pub mod ownership;
pub mod repositories;
pub mod schedules;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use clinic_types::NonEmptyText;
pub use config::CoreConfig;
pub use db::Database;
pub use error::{ClinicError, ClinicResult};
