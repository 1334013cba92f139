//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables.

use crate::{ClinicError, ClinicResult};
use chrono::Duration;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    upload_dir: PathBuf,
    public_dir: PathBuf,
    token_ttl: Option<Duration>,
    max_upload_bytes: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if `max_upload_bytes` is zero or the token
    /// lifetime is not positive or longer than ten years.
    pub fn new(
        database_path: PathBuf,
        upload_dir: PathBuf,
        public_dir: PathBuf,
        token_ttl: Option<Duration>,
        max_upload_bytes: u64,
    ) -> ClinicResult<Self> {
        if max_upload_bytes == 0 {
            return Err(ClinicError::InvalidInput(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }
        if token_ttl.is_some_and(|ttl| ttl <= Duration::zero()) {
            return Err(ClinicError::InvalidInput(
                "token lifetime must be positive".into(),
            ));
        }
        if token_ttl.is_some_and(|ttl| ttl.num_hours() > crate::constants::MAX_TOKEN_TTL_HOURS) {
            return Err(ClinicError::InvalidInput(
                "token lifetime cannot exceed ten years".into(),
            ));
        }

        Ok(Self {
            database_path,
            upload_dir,
            public_dir,
            token_ttl,
            max_upload_bytes,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// `None` means tokens never expire.
    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}

/// Resolve configuration from the `CLINIC_*` environment variables.
///
/// Binaries call this once at startup, after loading `.env`.
///
/// # Errors
///
/// Returns `ClinicError::InvalidInput` for unparsable numeric values.
pub fn from_environment() -> ClinicResult<CoreConfig> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    let database_path = var("CLINIC_DATABASE_PATH")
        .unwrap_or_else(|| crate::constants::DEFAULT_DATABASE_PATH.into());
    let upload_dir =
        var("CLINIC_UPLOAD_DIR").unwrap_or_else(|| crate::constants::DEFAULT_UPLOAD_DIR.into());
    let public_dir =
        var("CLINIC_PUBLIC_DIR").unwrap_or_else(|| crate::constants::DEFAULT_PUBLIC_DIR.into());
    let token_ttl = token_ttl_from_env_value(var("CLINIC_TOKEN_TTL_HOURS"))?;
    let max_upload_bytes = max_upload_bytes_from_env_value(
        var("CLINIC_MAX_UPLOAD_BYTES"),
        clinic_files::DEFAULT_MAX_UPLOAD_BYTES,
    )?;

    CoreConfig::new(
        PathBuf::from(database_path),
        PathBuf::from(upload_dir),
        PathBuf::from(public_dir),
        token_ttl,
        max_upload_bytes,
    )
}

/// Parse the token lifetime (whole hours) from an optional string value.
///
/// `None`, empty or `0` means tokens do not expire. Values above
/// [`MAX_TOKEN_TTL_HOURS`](crate::constants::MAX_TOKEN_TTL_HOURS) are rejected.
pub fn token_ttl_from_env_value(value: Option<String>) -> ClinicResult<Option<Duration>> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let hours: i64 = value.parse().map_err(|_| {
        ClinicError::InvalidInput(format!("CLINIC_TOKEN_TTL_HOURS is not a number: {value}"))
    })?;
    match hours {
        0 => Ok(None),
        h if h < 0 => Err(ClinicError::InvalidInput(
            "CLINIC_TOKEN_TTL_HOURS cannot be negative".into(),
        )),
        h if h > crate::constants::MAX_TOKEN_TTL_HOURS => Err(ClinicError::InvalidInput(
            format!(
                "CLINIC_TOKEN_TTL_HOURS cannot exceed {} hours",
                crate::constants::MAX_TOKEN_TTL_HOURS
            ),
        )),
        h => Duration::try_hours(h).map(Some).ok_or_else(|| {
            ClinicError::InvalidInput(format!("CLINIC_TOKEN_TTL_HOURS is out of range: {h}"))
        }),
    }
}

/// Parse the upload limit in bytes, falling back to `default` when unset.
pub fn max_upload_bytes_from_env_value(value: Option<String>, default: u64) -> ClinicResult<u64> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    value.parse().map_err(|_| {
        ClinicError::InvalidInput(format!("CLINIC_MAX_UPLOAD_BYTES is not a number: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_parsing() {
        assert_eq!(token_ttl_from_env_value(None).unwrap(), None);
        assert_eq!(token_ttl_from_env_value(Some(" ".into())).unwrap(), None);
        assert_eq!(token_ttl_from_env_value(Some("0".into())).unwrap(), None);
        assert_eq!(
            token_ttl_from_env_value(Some("24".into())).unwrap(),
            Some(Duration::hours(24))
        );
        assert!(token_ttl_from_env_value(Some("-1".into())).is_err());
        assert!(token_ttl_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn oversized_token_ttl_is_rejected() {
        let ten_years = crate::constants::MAX_TOKEN_TTL_HOURS.to_string();
        assert!(token_ttl_from_env_value(Some(ten_years)).unwrap().is_some());
        assert!(matches!(
            token_ttl_from_env_value(Some("87601".into())),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(matches!(
            token_ttl_from_env_value(Some("10000000000".into())),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(token_ttl_from_env_value(Some(i64::MAX.to_string())).is_err());
    }

    #[test]
    fn max_upload_bytes_parsing() {
        assert_eq!(max_upload_bytes_from_env_value(None, 10).unwrap(), 10);
        assert_eq!(
            max_upload_bytes_from_env_value(Some("2048".into()), 10).unwrap(),
            2048
        );
        assert!(max_upload_bytes_from_env_value(Some("lots".into()), 10).is_err());
    }

    #[test]
    fn config_rejects_zero_upload_limit() {
        let result = CoreConfig::new(
            "clinic.db".into(),
            "uploads".into(),
            "public".into(),
            None,
            0,
        );
        assert!(matches!(result, Err(ClinicError::InvalidInput(_))));
    }
}
