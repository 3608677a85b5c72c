//! Canonical note identity.
//!
//! A [`NotePath`] carries the URI a client handed us verbatim, alongside a
//! canonical absolute filesystem path used for all equality, hashing and
//! ordering. The client gets its own URI echoed back unchanged; everything
//! internal compares canonical forms only.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

use tower_lsp::lsp_types::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct NotePath {
    uri: Url,
    canonical: PathBuf,
}

impl NotePath {
    /// Builds a note path from a `file://` URI, keeping the URI verbatim.
    pub fn from_uri(uri: &Url) -> Result<NotePath> {
        if uri.scheme() != "file" {
            return Err(Error::BadPath(uri.to_string()));
        }

        let fs_path = uri
            .to_file_path()
            .map_err(|_| Error::BadPath(uri.to_string()))?;

        Ok(NotePath {
            uri: uri.clone(),
            canonical: normalize(&fs_path),
        })
    }

    /// Builds a note path from an absolute filesystem path, deriving the URI.
    pub fn from_fs_path(path: &Path) -> Result<NotePath> {
        if !path.is_absolute() {
            return Err(Error::BadPath(path.display().to_string()));
        }

        let canonical = normalize(path);
        let uri = Url::from_file_path(&canonical)
            .map_err(|_| Error::BadPath(path.display().to_string()))?;

        Ok(NotePath { uri, canonical })
    }

    /// The URI exactly as the client sent it (or as derived from disk).
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn as_path(&self) -> &Path {
        &self.canonical
    }

    /// The note name: file basename without the `.md` extension.
    pub fn note_name(&self) -> Option<&str> {
        self.canonical.file_stem()?.to_str()
    }

    pub fn is_under(&self, root: &Path) -> bool {
        self.canonical.starts_with(normalize(root))
    }

    fn cmp_key(&self) -> Cow<'_, str> {
        fold_case(self.canonical.to_string_lossy())
    }
}

impl PartialEq for NotePath {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_key() == other.cmp_key()
    }
}

impl Eq for NotePath {}

impl Hash for NotePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cmp_key().hash(state)
    }
}

impl PartialOrd for NotePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NotePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

/// Lexical canonicalization: resolves `.`/`..`, normalizes separators and
/// (on Windows) lowercases the drive prefix. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                if cfg!(windows) {
                    out.push(prefix.as_os_str().to_string_lossy().to_lowercase());
                } else {
                    out.push(prefix.as_os_str());
                }
            }
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }

    out
}

/// Path comparison is case-insensitive where the platform filesystem is.
fn fold_case(text: Cow<'_, str>) -> Cow<'_, str> {
    if cfg!(any(windows, target_os = "macos")) {
        Cow::Owned(text.to_lowercase())
    } else {
        text
    }
}
