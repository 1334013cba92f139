//! Constants used throughout the clinic core crate.

/// Default SQLite database file when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "clinic.db";

/// Default directory for medical record attachments.
pub const DEFAULT_UPLOAD_DIR: &str = "storage/medical_records";

/// Default directory holding the single-page front end build.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Longest accepted token lifetime: ten years.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

/// Prefix marking a guest in patient identifier strings (`guest_<id>`).
pub const GUEST_ID_PREFIX: &str = "guest_";

/// Message returned when a booking transaction fails.
pub const BOOKING_FAILED_MESSAGE: &str = "Failed to book appointment. Please try again.";

/// Number of upcoming appointments shown on the doctor dashboard.
pub const DASHBOARD_UPCOMING_LIMIT: i64 = 5;

/// Ratings at or above this value count as satisfied.
pub const SATISFIED_RATING: i64 = 4;

/// Record types accepted for medical records.
pub const RECORD_TYPES: &[&str] = &["diagnosis", "lab_result", "imaging", "prescription", "other"];
