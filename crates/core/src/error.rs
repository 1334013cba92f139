use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("the given data was invalid")]
    Validation(ValidationErrors),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is inactive")]
    AccountInactive,
    #[error("this action is unauthorized")]
    Forbidden,

    #[error("failed to book appointment")]
    BookingFailed(#[source] rusqlite::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("stored value is corrupt: {0}")]
    CorruptRow(String),

    #[error("attachment error: {0}")]
    Files(#[from] clinic_files::FilesError),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("token lifetime is out of range")]
    TokenLifetime,
}

impl ClinicError {
    /// Shorthand for a validation failure on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        ClinicError::Validation(errors)
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
