/// Folder under the upload root that holds content-addressed files.
pub const HASH_FOLDER_NAME: &str = "sha256";

/// File extensions accepted for medical record attachments (lower case, no dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "jpg", "jpeg", "png"];

/// Upload limit used when none is configured (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
