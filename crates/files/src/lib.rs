//! Clinic attachment storage
//!
//! This crate stores the binary files attached to medical records.
//!
//! ## Design Principles
//!
//! - Record metadata lives in the database; bytes live on disk
//! - Files are content-addressed by SHA-256 and immutable once written
//! - Identical uploads are stored once and shared by every record that references them
//! - Only an allow-list of document and image formats is accepted
//!
//! ## Storage Layout
//!
//! ```text
//! <upload_dir>/
//! └── sha256/
//!     └── ab/
//!         └── 3f/
//!             └── ab3f9e…
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use clinic_files::AttachmentStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = AttachmentStore::new(Path::new("storage/medical_records"), 10 * 1024 * 1024)?;
//! let metadata = store.add("scan.pdf", b"%PDF-1.7 ...")?;
//! let bytes = store.read(&metadata.hash)?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{ALLOWED_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES, HASH_FOLDER_NAME};
pub use files::{content_type_for_extension, AttachmentStore, FileMetadata};

/// Errors that can occur during attachment operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path or hash validation failed (potential directory traversal or unsafe name)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Extension is not on the allow-list
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Upload is larger than the configured limit
    #[error("File is {size} bytes, the maximum is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    /// Upload contained no bytes
    #[error("File is empty")]
    EmptyFile,

    /// No stored file for the given hash
    #[error("File not found: {0}")]
    NotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
