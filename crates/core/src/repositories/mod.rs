//! Table-backed services, one per clinic entity.
//!
//! Every service holds a clone of the shared [`Database`](crate::Database) handle, locks the
//! connection for one unit of work and returns wire types from `api-shared`.

pub mod appointments;
pub mod blogs;
pub mod cart;
pub mod catalogue;
pub mod consultations;
pub mod doctors;
pub mod galleries;
pub mod guests;
pub mod medical_records;
pub mod messages;
pub mod patients;
pub mod prescriptions;
pub mod reviews;
pub mod subscriptions;
