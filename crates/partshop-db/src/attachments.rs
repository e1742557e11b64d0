//! # Attachment Store
//!
//! Owns the image and datasheet files that rows point at.
//!
//! ## Layout
//! ```text
//! <root>/
//! ├── images/       1718000000000_1a2b3c4d_resistor.png
//! └── datasheets/   1718000000123_9f8e7d6c_lm7805.pdf
//! ```
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  store()  ──► file:// URI ──► saved on a row                           │
//! │                                                                         │
//! │  row deleted / attachment replaced                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReleaseQueue::push() (inside the transaction)                         │
//! │       │                                                                 │
//! │       ├── commit   ──► flush() ──► release() each file, best-effort    │
//! │       └── rollback ──► queue dropped, files untouched                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deletes never fail the caller: a file that is already gone counts as
//! released, anything else is logged at `warn`.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_SCHEME: &str = "file://";

/// Errors from the fallible (write) side of the store.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to write attachment {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid attachment name: {0}")]
    InvalidName(String),
}

/// Which subtree an attachment lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Datasheet,
}

impl AttachmentKind {
    pub const ALL: [AttachmentKind; 2] = [AttachmentKind::Image, AttachmentKind::Datasheet];

    pub fn dir_name(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "images",
            AttachmentKind::Datasheet => "datasheets",
        }
    }
}

/// Files on disk referenced by category and item rows.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Creates a store rooted at `root`. Relative roots are anchored at the
    /// current directory so stored URIs are always absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        AttachmentStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: AttachmentKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Creates both subtrees if they are missing.
    pub async fn ensure_dirs(&self) -> Result<(), AttachmentError> {
        for kind in AttachmentKind::ALL {
            let dir = self.dir(kind);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| AttachmentError::Write { path: dir, source })?;
        }
        Ok(())
    }

    /// Writes `bytes` into the store and returns the `file://` URI to save
    /// on the owning row.
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so a crash never leaves a half-written attachment under its final name.
    pub async fn store(
        &self,
        kind: AttachmentKind,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, AttachmentError> {
        let name = sanitize_file_name(original_name)
            .ok_or_else(|| AttachmentError::InvalidName(original_name.to_string()))?;

        let dir = self.dir(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| AttachmentError::Write {
                path: dir.clone(),
                source,
            })?;

        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            &id[..8],
            name
        );
        let final_path = dir.join(&file_name);
        let temp_path = dir.join(format!(".{file_name}.tmp"));

        if let Err(source) = tokio::fs::write(&temp_path, bytes).await {
            return Err(AttachmentError::Write {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(AttachmentError::Write {
                path: final_path,
                source,
            });
        }

        debug!(kind = kind.dir_name(), file = %file_name, size = bytes.len(), "Attachment stored");
        Ok(to_uri(&final_path))
    }

    /// Copies a file picked by the user into the store.
    pub async fn import_file(
        &self,
        kind: AttachmentKind,
        path: &Path,
    ) -> Result<String, AttachmentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment");

        self.store(kind, name, &bytes).await
    }

    /// Maps a stored reference to a path inside the store.
    ///
    /// Returns `None` for references that point outside the root; those
    /// files are not owned by the store and are never deleted.
    pub fn resolve(&self, uri: &str) -> Option<PathBuf> {
        let raw = uri.strip_prefix(FILE_SCHEME).unwrap_or(uri);
        if raw.is_empty() {
            return None;
        }

        let path = Path::new(raw);
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }

        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        if path.starts_with(&self.root) && path != self.root {
            Some(path)
        } else {
            None
        }
    }

    /// Returns true if the referenced file is present in the store.
    pub async fn exists(&self, uri: &str) -> bool {
        match self.resolve(uri) {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Deletes the referenced file, best-effort.
    ///
    /// ## Returns
    /// * `true` - the file is gone (deleted now, or already missing)
    /// * `false` - the reference is foreign or the delete failed (logged)
    pub async fn release(&self, uri: &str) -> bool {
        let Some(path) = self.resolve(uri) else {
            debug!(uri, "Attachment outside store, not deleting");
            return false;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Attachment released");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete attachment");
                false
            }
        }
    }

    /// Removes every stored attachment and recreates the empty subtrees.
    pub async fn purge_all(&self) -> bool {
        let mut ok = true;
        for kind in AttachmentKind::ALL {
            let dir = self.dir(kind);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to purge attachments");
                    ok = false;
                }
            }
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %e, "Failed to recreate attachment dir");
                ok = false;
            }
        }
        ok
    }
}

/// Attachment URIs to release once the surrounding transaction commits.
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    uris: Vec<String>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        if !uri.is_empty() && !self.uris.contains(&uri) {
            self.uris.push(uri);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Releases every queued file. Call only after commit.
    ///
    /// Returns how many files are confirmed gone.
    pub async fn flush(self, store: &AttachmentStore) -> usize {
        let mut released = 0;
        for uri in &self.uris {
            if store.release(uri).await {
                released += 1;
            }
        }
        released
    }
}

fn to_uri(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.display())
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
