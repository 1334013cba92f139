//! Content-addressed attachment store implementation
//!
//! This module provides [`AttachmentStore`], which validates, stores and reads back the
//! files doctors attach to medical records.
//!
//! # Content Addressing
//!
//! Files are stored using their SHA-256 hash as the identifier. This provides:
//!
//! - **Deduplication**: Identical files are stored once
//! - **Integrity**: File content can be verified against its hash
//! - **Immutability**: Files cannot be modified after creation
//! - **Deterministic paths**: Same content always produces the same path
//!
//! # Security Model
//!
//! - The root directory is canonicalised at construction
//! - Only hashes of exactly 64 lowercase hex characters are turned into paths
//! - Original filenames are reduced to their final component and never used as paths
//! - Extensions are checked against [`ALLOWED_EXTENSIONS`]

use crate::{FilesError, ALLOWED_EXTENSIONS, HASH_FOLDER_NAME};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for a stored attachment
///
/// Persisted alongside the medical record row so the file can be served back with its
/// original name and content type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hexadecimal SHA-256 digest of the file content
    pub hash: String,

    /// Path relative to the upload root where the file is stored
    pub relative_path: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Content type to serve the file with
    ///
    /// Sniffed from the bytes when possible, otherwise derived from the extension.
    pub media_type: NonEmptyText,

    /// Original filename as uploaded (final path component only)
    pub original_filename: NonEmptyText,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Store for medical record attachments
///
/// Stateless apart from its root directory and size limit, so it is cheap to share behind
/// an `Arc`.
#[derive(Debug)]
pub struct AttachmentStore {
    /// Canonicalised upload root
    root_directory: PathBuf,

    /// Maximum accepted upload size in bytes
    max_bytes: u64,
}

impl AttachmentStore {
    /// Creates a store rooted at `root_directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The path exists but is not a directory
    /// - The directory cannot be created or canonicalised
    pub fn new(root_directory: &Path, max_bytes: u64) -> Result<Self, FilesError> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            max_bytes,
        })
    }

    /// Checks an upload's name and size without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPath` for unusable names, `FilesError::UnsupportedFileType`
    /// for extensions outside the allow-list, `FilesError::EmptyFile` for zero bytes and
    /// `FilesError::FileTooLarge` above the configured limit.
    pub fn validate(&self, original_filename: &str, size_bytes: u64) -> Result<String, FilesError> {
        let name = sanitise_filename(original_filename)?;
        let extension = extension_of(&name)
            .ok_or_else(|| FilesError::UnsupportedFileType(name.clone()))?;

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FilesError::UnsupportedFileType(extension));
        }
        if size_bytes == 0 {
            return Err(FilesError::EmptyFile);
        }
        if size_bytes > self.max_bytes {
            return Err(FilesError::FileTooLarge {
                size: size_bytes,
                max: self.max_bytes,
            });
        }

        Ok(name)
    }

    /// Validates and stores an upload.
    ///
    /// If identical content is already stored the existing file is reused and only fresh
    /// metadata is returned.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::validate`], or `FilesError::Io` if the storage
    /// directory or file cannot be written.
    pub fn add(&self, original_filename: &str, bytes: &[u8]) -> Result<FileMetadata, FilesError> {
        let name = self.validate(original_filename, bytes.len() as u64)?;

        let hash = hex::encode(Sha256::digest(bytes));
        let storage_path = self.compute_storage_path(&hash);

        if storage_path.exists() {
            tracing::debug!(hash = %hash, "attachment already stored, reusing");
        } else {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }

            // Write to a sibling temp file first so a crash never leaves a truncated blob
            // under its final hash name.
            let temp_path = storage_path.with_extension("partial");
            fs::write(&temp_path, bytes)?;
            fs::rename(&temp_path, &storage_path).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write file to {}: {}", storage_path.display(), e),
                ))
            })?;
        }

        let media_type = infer::get(bytes)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| extension_of(&name).map(|ext| content_type_for_extension(&ext).into()))
            .unwrap_or_else(|| "application/octet-stream".into());

        Ok(FileMetadata {
            relative_path: self.compute_relative_path(&hash)?,
            hash,
            size_bytes: bytes.len() as u64,
            media_type: NonEmptyText::new(media_type)
                .map_err(|e| FilesError::InvalidPath(e.to_string()))?,
            original_filename: NonEmptyText::new(&name)
                .map_err(|e| FilesError::InvalidPath(e.to_string()))?,
            stored_at: Utc::now(),
        })
    }

    /// Retrieves a stored file by its hash.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPath` if `hash` is not a SHA-256 hex digest,
    /// `FilesError::NotFound` if nothing is stored under it, or `FilesError::Io` on read
    /// failure.
    pub fn read(&self, hash: &str) -> Result<Vec<u8>, FilesError> {
        if !is_sha256_hex(hash) {
            return Err(FilesError::InvalidPath(format!("not a sha256 digest: {hash}")));
        }

        let storage_path = self.compute_storage_path(hash);
        if !storage_path.is_file() {
            return Err(FilesError::NotFound(hash.to_string()));
        }

        fs::read(&storage_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", storage_path.display(), e),
            ))
        })
    }

    /// Returns the canonicalised upload root.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Returns the upload size limit in bytes.
    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Absolute storage path for a hash: `<root>/sha256/<h[0..2]>/<h[2..4]>/<hash>`.
    fn compute_storage_path(&self, hash_hex: &str) -> PathBuf {
        self.root_directory
            .join(HASH_FOLDER_NAME)
            .join(&hash_hex[0..2])
            .join(&hash_hex[2..4])
            .join(hash_hex)
    }

    fn compute_relative_path(&self, hash_hex: &str) -> Result<NonEmptyText, FilesError> {
        NonEmptyText::new(format!(
            "{}/{}/{}/{}",
            HASH_FOLDER_NAME,
            &hash_hex[0..2],
            &hash_hex[2..4],
            hash_hex
        ))
        .map_err(|e| FilesError::InvalidPath(e.to_string()))
    }
}

/// Maps an allowed extension to the content type used when serving the file.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

fn sanitise_filename(original: &str) -> Result<String, FilesError> {
    // Browsers on some platforms send the full client-side path.
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(FilesError::InvalidPath(format!("unusable filename: {original:?}")));
    }
    Ok(name.to_string())
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_sha256_hex(input: &str) -> bool {
    input.len() == 64 && input.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn store(temp: &TempDir) -> AttachmentStore {
        AttachmentStore::new(&temp.path().join("uploads"), 1024).unwrap()
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("uploads");
        assert!(!root.exists());

        let store = AttachmentStore::new(&root, 1024).unwrap();

        assert!(root.is_dir());
        assert!(store.root_directory().ends_with("uploads"));
    }

    #[test]
    fn test_new_rejects_file_as_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let result = AttachmentStore::new(&root, 1024);

        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_add_and_read_pdf() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let metadata = store.add("report.pdf", b"%PDF-1.4 test").unwrap();

        assert_eq!(metadata.hash.len(), 64);
        assert_eq!(metadata.size_bytes, 13);
        assert_eq!(metadata.original_filename.as_str(), "report.pdf");
        assert_eq!(metadata.media_type.as_str(), "application/pdf");
        assert_eq!(
            metadata.relative_path.as_str(),
            format!(
                "sha256/{}/{}/{}",
                &metadata.hash[0..2],
                &metadata.hash[2..4],
                metadata.hash
            )
        );
        assert_eq!(store.read(&metadata.hash).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn test_add_sniffs_png() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let metadata = store.add("photo.PNG", PNG_HEADER).unwrap();

        assert_eq!(metadata.media_type.as_str(), "image/png");
    }

    #[test]
    fn test_add_same_content_twice_reuses_blob() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let first = store.add("a.pdf", b"same bytes").unwrap();
        let second = store.add("b.pdf", b"same bytes").unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(second.original_filename.as_str(), "b.pdf");
    }

    #[test]
    fn test_add_strips_client_directories() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let metadata = store.add("C:\\Users\\me\\scan.jpg", b"jpeg-ish").unwrap();

        assert_eq!(metadata.original_filename.as_str(), "scan.jpg");
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let result = store.add("script.sh", b"#!/bin/sh");

        assert!(matches!(result, Err(FilesError::UnsupportedFileType(ext)) if ext == "sh"));
    }

    #[test]
    fn test_rejects_missing_extension() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert!(matches!(
            store.add("README", b"text"),
            Err(FilesError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_and_empty_files() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let big = vec![0u8; 1025];
        assert!(matches!(
            store.add("big.pdf", &big),
            Err(FilesError::FileTooLarge { size: 1025, max: 1024 })
        ));
        assert!(matches!(store.add("empty.pdf", b""), Err(FilesError::EmptyFile)));
    }

    #[test]
    fn test_read_rejects_non_hash_input() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert!(matches!(
            store.read("../../etc/passwd"),
            Err(FilesError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_read_unknown_hash_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let hash = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

        assert!(matches!(store.read(hash), Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for_extension("JPEG"), "image/jpeg");
        assert_eq!(
            content_type_for_extension("docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(content_type_for_extension("zip"), "application/octet-stream");
    }
}
