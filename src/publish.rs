//! Publishing finished previews.
//!
//! The pipeline does not own storage. It hands a payload and a
//! [`DestinationKey`] to a [`Publisher`] and gets a retrieval URL back.
//! [`DirectoryPublisher`] is a local blob store that writes under a root
//! directory; hosted stores implement [`Publisher`] themselves.
//!
//! # Example
//!
//! ```no_run
//! use loopclip::{DestinationKey, DirectoryPublisher, Publisher};
//!
//! let publisher = DirectoryPublisher::new("/srv/previews")
//!     .with_base_url("https://cdn.example.com/previews");
//! let key = DestinationKey::new("legs", "squat-01", "gif")?;
//! let url = publisher.publish(b"GIF89a...", &key)?;
//! assert_eq!(url, "https://cdn.example.com/previews/legs/squat-01.gif");
//! # Ok::<(), loopclip::PublishError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::Error as IoError,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Errors raised by a [`Publisher`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PublishError {
    /// A key segment is empty or contains a path separator.
    #[error("Invalid destination key: {0}")]
    InvalidKey(String),

    /// The destination already holds a payload and overwriting is disabled.
    #[error("Destination {0} already exists")]
    AlreadyExists(String),

    /// The store rejected the upload.
    #[error("Publisher rejected {key}: {reason}")]
    Rejected {
        /// Rendered destination key.
        key: String,
        /// Reason reported by the store.
        reason: String,
    },

    /// Writing the payload failed.
    #[error("Failed to write {path:?}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: IoError,
    },
}

/// Destination of a published preview: `{category}/{resource}.{ext}`.
///
/// Both identifiers are supplied by the caller; nothing is derived from the
/// video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    category: String,
    resource: String,
    extension: String,
}

impl DestinationKey {
    /// Build a key.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidKey`] if any segment is empty, contains
    /// `/` or `\`, or is `.`/`..`.
    pub fn new(
        category: impl Into<String>,
        resource: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self, PublishError> {
        let category = category.into();
        let resource = resource.into();
        let extension = extension.into();
        for (name, segment) in [
            ("category", &category),
            ("resource", &resource),
            ("extension", &extension),
        ] {
            check_segment(name, segment)?;
        }
        Ok(Self {
            category,
            resource,
            extension,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The key as a relative path under a store root.
    pub fn to_path(&self) -> PathBuf {
        Path::new(&self.category).join(format!("{}.{}", self.resource, self.extension))
    }
}

impl Display for DestinationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}.{}", self.category, self.resource, self.extension)
    }
}

fn check_segment(name: &str, segment: &str) -> Result<(), PublishError> {
    if segment.is_empty() {
        return Err(PublishError::InvalidKey(format!("{name} is empty")));
    }
    if segment.contains(['/', '\\']) || segment == "." || segment == ".." {
        return Err(PublishError::InvalidKey(format!(
            "{name} {segment:?} is not a single path segment"
        )));
    }
    Ok(())
}

/// A blob store that accepts a payload under a key and returns a durable URL.
pub trait Publisher: Send + Sync {
    /// Store `payload` at `key`.
    ///
    /// # Errors
    ///
    /// Any [`PublishError`]; the pipeline passes it through unmodified.
    fn publish(&self, payload: &[u8], key: &DestinationKey) -> Result<String, PublishError>;
}

/// Stores previews as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
    base_url: Option<String>,
    overwrite: bool,
}

impl DirectoryPublisher {
    /// Publish under `root`, returning `file://` URLs and overwriting
    /// existing files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
            overwrite: true,
        }
    }

    /// Return `{base_url}/{key}` instead of a `file://` URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Refuse to replace an existing file when `false`.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Publisher for DirectoryPublisher {
    fn publish(&self, payload: &[u8], key: &DestinationKey) -> Result<String, PublishError> {
        let path = self.root.join(key.to_path());
        let io_error = |source: IoError| PublishError::Io {
            path: path.clone(),
            source,
        };

        if !self.overwrite && path.exists() {
            return Err(PublishError::AlreadyExists(key.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&path, payload).map_err(io_error)?;

        log::info!("Published {} bytes to {}", payload.len(), path.display());

        match &self.base_url {
            Some(base_url) => Ok(format!("{base_url}/{key}")),
            None => {
                let absolute = fs::canonicalize(&path).map_err(io_error)?;
                Ok(format!("file://{}", absolute.display()))
            }
        }
    }
}
