//! Shared handler state.

use chrono::NaiveDate;
use clinic_core::auth::AuthService;
use clinic_core::{ClinicResult, CoreConfig, Database};
use clinic_files::AttachmentStore;
use std::sync::Arc;

/// Application state for the REST API server
///
/// Holds the resolved configuration, the shared database handle and the attachment store.
/// Services are cheap to build from these, so handlers construct the ones they need.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub db: Database,
    pub files: Arc<AttachmentStore>,
    pub auth: AuthService,
}

impl AppState {
    /// Build state over an open database, creating the upload directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Files` if the upload directory cannot be created.
    pub fn new(cfg: CoreConfig, db: Database) -> ClinicResult<Self> {
        let files = AttachmentStore::new(cfg.upload_dir(), cfg.max_upload_bytes())?;
        let auth = AuthService::new(db.clone(), cfg.token_ttl());
        Ok(Self {
            cfg: Arc::new(cfg),
            db,
            files: Arc::new(files),
            auth,
        })
    }

    /// The calendar date requests are judged against.
    pub fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}
