//! Accounts, passwords and bearer tokens.
//!
//! Doctors and patients are separate principals with their own tables. A login issues an
//! opaque token tagged with the guard it was issued under; only the SHA-256 of the token
//! is stored. Resolving a token yields the principal it belongs to, and each HTTP guard
//! then accepts or rejects that principal.

use crate::db::{now_timestamp, Database};
use crate::repositories::{doctors, patients};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::auth::TOKEN_TYPE;
use api_shared::{
    ChangePasswordReq, Doctor, DoctorAuthRes, LoginReq, Patient, PatientAuthRes,
    RegisterDoctorReq, RegisterPatientReq,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use base64::Engine;
use chrono::{Duration, SecondsFormat, Utc};
use clinic_types::{EmailAddress, NonEmptyText, PhoneNumber};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// Named authentication context a token was issued under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    Doctor,
    Patient,
}

impl Guard {
    pub fn as_str(self) -> &'static str {
        match self {
            Guard::Doctor => "doctor",
            Guard::Patient => "patient",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "doctor" => Some(Guard::Doctor),
            "patient" => Some(Guard::Patient),
            _ => None,
        }
    }
}

/// The account a bearer token resolved to.
#[derive(Clone, Debug)]
pub enum Principal {
    Doctor(Doctor),
    Patient(Patient),
}

impl Principal {
    pub fn guard(&self) -> Guard {
        match self {
            Principal::Doctor(_) => Guard::Doctor,
            Principal::Patient(_) => Guard::Patient,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Principal::Doctor(doctor) => doctor.id,
            Principal::Patient(patient) => patient.id,
        }
    }
}

// ============================================================================
// PASSWORDS & TOKENS
// ============================================================================

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> ClinicResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ClinicError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; a malformed stored hash is an error.
pub fn verify_password(password: &str, stored: &str) -> ClinicResult<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| ClinicError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ClinicError::PasswordHash(e.to_string())),
    }
}

/// Random bearer token: 32 bytes of entropy, URL-safe base64.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a token, as stored in `access_tokens.token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// AUTH SERVICE
// ============================================================================

/// Registration, login and token resolution for both guards.
#[derive(Clone, Debug)]
pub struct AuthService {
    db: Database,
    token_ttl: Option<Duration>,
}

impl AuthService {
    /// Creates a new `AuthService`.
    ///
    /// # Arguments
    ///
    /// * `db` - Shared database handle
    /// * `token_ttl` - Lifetime of issued tokens; `None` means tokens never expire
    pub fn new(db: Database, token_ttl: Option<Duration>) -> Self {
        Self { db, token_ttl }
    }

    /// Registers a patient account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for missing or malformed fields and when the
    /// e-mail address is already registered.
    pub fn register_patient(&self, req: &RegisterPatientReq) -> ClinicResult<PatientAuthRes> {
        let mut errors = ValidationErrors::new();
        let name =
            validation::required_text(&mut errors, "name", req.name.as_deref(), SHORT_TEXT_MAX);
        let email = validation::required_email(&mut errors, "email", req.email.as_deref());
        let password = validation::new_password(
            &mut errors,
            req.password.as_deref(),
            req.password_confirmation.as_deref(),
        );
        let phone = validation::optional_phone(&mut errors, "phone", req.phone.as_deref());
        let gender = validation::optional_text(&mut errors, "gender", req.gender.as_deref(), 20);
        let date_of_birth =
            validation::optional_date(&mut errors, "date_of_birth", req.date_of_birth.as_deref());
        let address = validation::optional_text(
            &mut errors,
            "address",
            req.address.as_deref(),
            LONG_TEXT_MAX,
        );
        let password_hash = password.map(hash_password).transpose()?;

        let conn = self.db.lock()?;
        if let Some(email) = &email {
            if email_taken(&conn, "patients", email.as_str())? {
                errors.add("email", "The email has already been taken.");
            }
        }
        errors.into_result()?;
        let (Some(name), Some(email), Some(password_hash)) = (name, email, password_hash) else {
            return Err(ClinicError::InvalidInput("registration fields missing".into()));
        };

        let now = now_timestamp();
        conn.execute(
            "INSERT INTO patients (name, email, password_hash, phone, gender, date_of_birth,
                                   address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                name.as_str(),
                email.as_str(),
                password_hash,
                phone.as_ref().map(|p| p.as_str()),
                gender,
                date_of_birth.map(validation::format_date),
                address,
                now,
            ],
        )?;
        let patient = patients::load_patient(&conn, conn.last_insert_rowid())?;
        let token = self.issue_token(&conn, Guard::Patient, patient.id)?;
        tracing::info!(patient_id = patient.id, "patient registered");

        Ok(PatientAuthRes {
            token,
            token_type: TOKEN_TYPE.into(),
            patient,
        })
    }

    /// Creates a doctor account without signing it in.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` for missing or malformed fields and when the
    /// e-mail address is already registered.
    pub fn create_doctor(&self, req: &RegisterDoctorReq) -> ClinicResult<Doctor> {
        let draft = DoctorDraft::from_request(req)?;
        let conn = self.db.lock()?;
        draft.insert(&conn)
    }

    /// Registers a doctor account and signs it in.
    pub fn register_doctor(&self, req: &RegisterDoctorReq) -> ClinicResult<DoctorAuthRes> {
        let draft = DoctorDraft::from_request(req)?;
        let conn = self.db.lock()?;
        let doctor = draft.insert(&conn)?;
        let token = self.issue_token(&conn, Guard::Doctor, doctor.id)?;
        Ok(DoctorAuthRes {
            token,
            token_type: TOKEN_TYPE.into(),
            doctor,
        })
    }

    /// # Errors
    ///
    /// Returns `ClinicError::InvalidCredentials` for an unknown e-mail or wrong password.
    pub fn login_patient(&self, req: &LoginReq) -> ClinicResult<PatientAuthRes> {
        let (email, password) = login_fields(req)?;
        let row: Option<(i64, String)> = self
            .db
            .lock()?
            .query_row(
                "SELECT id, password_hash FROM patients WHERE email = ?1",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, stored)) = row else {
            return Err(ClinicError::InvalidCredentials);
        };
        if !verify_password(&password, &stored)? {
            return Err(ClinicError::InvalidCredentials);
        }

        let conn = self.db.lock()?;
        let patient = patients::load_patient(&conn, id)?;
        let token = self.issue_token(&conn, Guard::Patient, id)?;
        tracing::info!(patient_id = id, "patient logged in");
        Ok(PatientAuthRes {
            token,
            token_type: TOKEN_TYPE.into(),
            patient,
        })
    }

    /// # Errors
    ///
    /// Returns `ClinicError::InvalidCredentials` for an unknown e-mail or wrong password and
    /// `ClinicError::AccountInactive` when the doctor has been deactivated.
    pub fn login_doctor(&self, req: &LoginReq) -> ClinicResult<DoctorAuthRes> {
        let (email, password) = login_fields(req)?;
        let row: Option<(i64, String)> = self
            .db
            .lock()?
            .query_row(
                "SELECT id, password_hash FROM doctors WHERE email = ?1",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, stored)) = row else {
            return Err(ClinicError::InvalidCredentials);
        };
        if !verify_password(&password, &stored)? {
            return Err(ClinicError::InvalidCredentials);
        }

        let conn = self.db.lock()?;
        let doctor = doctors::load_doctor(&conn, id)?;
        if !doctor.is_active {
            tracing::warn!(doctor_id = id, "login refused for inactive doctor");
            return Err(ClinicError::AccountInactive);
        }
        let token = self.issue_token(&conn, Guard::Doctor, id)?;
        tracing::info!(doctor_id = id, "doctor logged in");
        Ok(DoctorAuthRes {
            token,
            token_type: TOKEN_TYPE.into(),
            doctor,
        })
    }

    /// Look up the principal a raw bearer token belongs to.
    ///
    /// Unknown or expired tokens, and tokens of deactivated doctors, resolve to `None`.
    pub fn resolve(&self, token: &str) -> ClinicResult<Option<Principal>> {
        let conn = self.db.lock()?;
        let now = now_timestamp();
        let row: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT id, guard, principal_id FROM access_tokens
                 WHERE token_hash = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![hash_token(token), now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((token_id, guard, principal_id)) = row else {
            return Ok(None);
        };
        let guard = Guard::parse(&guard)
            .ok_or_else(|| ClinicError::CorruptRow(format!("unknown guard {guard}")))?;

        let principal = match guard {
            Guard::Doctor => {
                let doctor = doctors::load_doctor(&conn, principal_id)?;
                if !doctor.is_active {
                    return Ok(None);
                }
                Principal::Doctor(doctor)
            }
            Guard::Patient => Principal::Patient(patients::load_patient(&conn, principal_id)?),
        };

        conn.execute(
            "UPDATE access_tokens SET last_used_at = ?1 WHERE id = ?2",
            params![now, token_id],
        )?;
        Ok(Some(principal))
    }

    /// Revoke the presented token. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "DELETE FROM access_tokens WHERE token_hash = ?1",
            [hash_token(token)],
        )?;
        Ok(())
    }

    /// Change a patient's password after verifying the current one.
    pub fn change_patient_password(
        &self,
        patient_id: i64,
        req: &ChangePasswordReq,
    ) -> ClinicResult<()> {
        self.change_password("patients", patient_id, req)
    }

    /// Change a doctor's password after verifying the current one.
    pub fn change_doctor_password(
        &self,
        doctor_id: i64,
        req: &ChangePasswordReq,
    ) -> ClinicResult<()> {
        self.change_password("doctors", doctor_id, req)
    }

    fn change_password(&self, table: &str, id: i64, req: &ChangePasswordReq) -> ClinicResult<()> {
        let mut errors = ValidationErrors::new();
        let current = req.current_password.as_deref().filter(|p| !p.is_empty());
        if current.is_none() {
            errors.add("current_password", "The current password field is required.");
        }
        let password = validation::new_password(
            &mut errors,
            req.password.as_deref(),
            req.password_confirmation.as_deref(),
        );

        let stored: String = self
            .db
            .lock()?
            .query_row(
                &format!("SELECT password_hash FROM {table} WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .map_err(crate::db::not_found("account"))?;
        if let Some(current) = current {
            if !verify_password(current, &stored)? {
                errors.add("current_password", "The current password is incorrect.");
            }
        }
        errors.into_result()?;
        let Some(password) = password else {
            return Err(ClinicError::InvalidInput("password missing".into()));
        };
        let password_hash = hash_password(password)?;

        self.db.lock()?.execute(
            &format!("UPDATE {table} SET password_hash = ?1, updated_at = ?2 WHERE id = ?3"),
            params![password_hash, now_timestamp(), id],
        )?;
        tracing::info!(table, id, "password changed");
        Ok(())
    }

    /// Delete tokens whose expiry has passed. Returns how many were removed.
    pub fn prune_expired_tokens(&self) -> ClinicResult<usize> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM access_tokens WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            [now_timestamp()],
        )?;
        Ok(removed)
    }

    fn issue_token(
        &self,
        conn: &Connection,
        guard: Guard,
        principal_id: i64,
    ) -> ClinicResult<String> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = match self.token_ttl {
            Some(ttl) => {
                let at = now.checked_add_signed(ttl).ok_or(ClinicError::TokenLifetime)?;
                Some(at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            None => None,
        };
        conn.execute(
            "INSERT INTO access_tokens (guard, principal_id, token_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                guard.as_str(),
                principal_id,
                hash_token(&token),
                now.to_rfc3339_opts(SecondsFormat::Secs, true),
                expires_at,
            ],
        )?;
        Ok(token)
    }
}

fn login_fields(req: &LoginReq) -> ClinicResult<(String, String)> {
    let mut errors = ValidationErrors::new();
    let email = validation::required_email(&mut errors, "email", req.email.as_deref());
    let password = req.password.clone().filter(|p| !p.is_empty());
    if password.is_none() {
        errors.add("password", "The password field is required.");
    }
    errors.into_result()?;
    match (email, password) {
        (Some(email), Some(password)) => Ok((email.as_str().to_string(), password)),
        _ => Err(ClinicError::InvalidCredentials),
    }
}

fn email_taken(conn: &Connection, table: &str, email: &str) -> ClinicResult<bool> {
    let taken: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE email = ?1)"),
        [email],
        |row| row.get(0),
    )?;
    Ok(taken == 1)
}

/// Doctor registration fields, checked and with the password already hashed.
struct DoctorDraft {
    errors: ValidationErrors,
    name: Option<NonEmptyText>,
    email: Option<EmailAddress>,
    password_hash: Option<String>,
    phone: Option<PhoneNumber>,
    specialization: Option<NonEmptyText>,
    qualification: Option<String>,
    experience_years: Option<i64>,
    fee: Option<f64>,
    bio: Option<String>,
}

impl DoctorDraft {
    fn from_request(req: &RegisterDoctorReq) -> ClinicResult<Self> {
        let mut errors = ValidationErrors::new();
        let name =
            validation::required_text(&mut errors, "name", req.name.as_deref(), SHORT_TEXT_MAX);
        let email = validation::required_email(&mut errors, "email", req.email.as_deref());
        let password = validation::new_password(
            &mut errors,
            req.password.as_deref(),
            req.password_confirmation.as_deref(),
        );
        let specialization = validation::required_text(
            &mut errors,
            "specialization",
            req.specialization.as_deref(),
            SHORT_TEXT_MAX,
        );
        let phone = validation::optional_phone(&mut errors, "phone", req.phone.as_deref());
        let qualification = validation::optional_text(
            &mut errors,
            "qualification",
            req.qualification.as_deref(),
            SHORT_TEXT_MAX,
        );
        let experience_years =
            validation::int_between(&mut errors, "experience_years", req.experience_years, 0, 80);
        let fee = validation::non_negative(&mut errors, "consultation_fee", req.consultation_fee);
        let bio = validation::optional_text(&mut errors, "bio", req.bio.as_deref(), LONG_TEXT_MAX);

        Ok(Self {
            password_hash: password.map(hash_password).transpose()?,
            errors,
            name,
            email,
            phone,
            specialization,
            qualification,
            experience_years,
            fee,
            bio,
        })
    }

    fn insert(self, conn: &Connection) -> ClinicResult<Doctor> {
        let mut errors = self.errors;
        if let Some(email) = &self.email {
            if email_taken(conn, "doctors", email.as_str())? {
                errors.add("email", "The email has already been taken.");
            }
        }
        errors.into_result()?;
        let (Some(name), Some(email), Some(password_hash), Some(specialization)) =
            (self.name, self.email, self.password_hash, self.specialization)
        else {
            return Err(ClinicError::InvalidInput("registration fields missing".into()));
        };

        let now = now_timestamp();
        conn.execute(
            "INSERT INTO doctors (name, email, password_hash, phone, specialization,
                                  qualification, experience_years, bio, consultation_fee,
                                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                name.as_str(),
                email.as_str(),
                password_hash,
                self.phone.as_ref().map(|p| p.as_str()),
                specialization.as_str(),
                self.qualification,
                self.experience_years,
                self.bio,
                self.fee,
                now,
            ],
        )?;
        let doctor = doctors::load_doctor(conn, conn.last_insert_rowid())?;
        tracing::info!(doctor_id = doctor.id, "doctor registered");
        Ok(doctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{doctor_req, patient_req};

    fn service() -> AuthService {
        AuthService::new(Database::open_in_memory().unwrap(), None)
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn tokens_are_random_and_hashed() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_eq!(hash_token(&a).len(), 64);
    }

    #[test]
    fn register_and_resolve_patient() {
        let auth = service();
        let res = auth.register_patient(&patient_req("grace@example.com")).unwrap();
        assert_eq!(res.token_type, "Bearer");

        let principal = auth.resolve(&res.token).unwrap().unwrap();
        assert_eq!(principal.guard(), Guard::Patient);
        assert_eq!(principal.id(), res.patient.id);
    }

    #[test]
    fn duplicate_email_is_a_field_error() {
        let auth = service();
        auth.register_patient(&patient_req("grace@example.com")).unwrap();
        let err = auth
            .register_patient(&patient_req("GRACE@example.com"))
            .unwrap_err();
        match err {
            ClinicError::Validation(errors) => assert!(errors.has("email")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn same_email_may_exist_under_both_guards() {
        let auth = service();
        auth.register_patient(&patient_req("shared@example.com")).unwrap();
        assert!(auth.register_doctor(&doctor_req("shared@example.com")).is_ok());
    }

    #[test]
    fn wrong_password_is_generic() {
        let auth = service();
        auth.register_doctor(&doctor_req("ada@example.com")).unwrap();

        let bad = LoginReq {
            email: Some("ada@example.com".into()),
            password: Some("nope-nope".into()),
        };
        assert!(matches!(auth.login_doctor(&bad), Err(ClinicError::InvalidCredentials)));

        let unknown = LoginReq {
            email: Some("nobody@example.com".into()),
            password: Some("nope-nope".into()),
        };
        assert!(matches!(auth.login_doctor(&unknown), Err(ClinicError::InvalidCredentials)));
    }

    #[test]
    fn inactive_doctor_cannot_log_in_and_tokens_stop_resolving() {
        let auth = service();
        let registered = auth.register_doctor(&doctor_req("ada@example.com")).unwrap();
        auth.db
            .lock()
            .unwrap()
            .execute("UPDATE doctors SET is_active = 0", [])
            .unwrap();

        let login = LoginReq {
            email: Some("ada@example.com".into()),
            password: Some("correct horse".into()),
        };
        assert!(matches!(auth.login_doctor(&login), Err(ClinicError::AccountInactive)));
        assert!(auth.resolve(&registered.token).unwrap().is_none());
    }

    #[test]
    fn logout_revokes_token() {
        let auth = service();
        let res = auth.register_doctor(&doctor_req("ada@example.com")).unwrap();
        auth.logout(&res.token).unwrap();
        assert!(auth.resolve(&res.token).unwrap().is_none());
    }

    #[test]
    fn expired_tokens_do_not_resolve_and_are_pruned() {
        let auth = service();
        let res = auth.register_patient(&patient_req("grace@example.com")).unwrap();
        auth.db
            .lock()
            .unwrap()
            .execute(
                "UPDATE access_tokens SET expires_at = '2000-01-01T00:00:00Z'",
                [],
            )
            .unwrap();

        assert!(auth.resolve(&res.token).unwrap().is_none());
        assert_eq!(auth.prune_expired_tokens().unwrap(), 1);
    }

    #[test]
    fn expiring_tokens_carry_an_expiry() {
        let auth = AuthService::new(Database::open_in_memory().unwrap(), Some(Duration::hours(2)));
        let res = auth.register_patient(&patient_req("grace@example.com")).unwrap();
        let expires_at: Option<String> = auth
            .db
            .lock()
            .unwrap()
            .query_row("SELECT expires_at FROM access_tokens", [], |row| row.get(0))
            .unwrap();
        assert!(expires_at.is_some());
        assert!(auth.resolve(&res.token).unwrap().is_some());
    }

    #[test]
    fn out_of_range_token_lifetime_is_an_error_not_a_panic() {
        let auth = AuthService::new(Database::open_in_memory().unwrap(), Some(Duration::MAX));
        let err = auth
            .register_patient(&patient_req("grace@example.com"))
            .unwrap_err();
        assert!(matches!(err, ClinicError::TokenLifetime));
    }

    #[test]
    fn change_password_requires_current() {
        let auth = service();
        let res = auth.register_patient(&patient_req("grace@example.com")).unwrap();

        let wrong = ChangePasswordReq {
            current_password: Some("not it at all".into()),
            password: Some("new password".into()),
            password_confirmation: Some("new password".into()),
        };
        match auth.change_patient_password(res.patient.id, &wrong).unwrap_err() {
            ClinicError::Validation(errors) => assert!(errors.has("current_password")),
            other => panic!("unexpected error: {other:?}"),
        }

        let right = ChangePasswordReq {
            current_password: Some("battery staple".into()),
            ..wrong
        };
        auth.change_patient_password(res.patient.id, &right).unwrap();
        let login = LoginReq {
            email: Some("grace@example.com".into()),
            password: Some("new password".into()),
        };
        assert!(auth.login_patient(&login).is_ok());
    }
}
