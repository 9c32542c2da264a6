//! On-disk layout of a repository storage root.
//!
//! ```text
//! <root>/
//!   repository.xml
//!   <symbolic-name>-<version>.jar ...
//! ```

use std::path::{Path, PathBuf};
use url::Url;

use crate::catalog::{Catalog, CatalogDocument};
use crate::codec;
use crate::error::{CaveError, Result};

pub const CATALOG_FILE_NAME: &str = "repository.xml";

pub fn catalog_document_path(root: &Path) -> PathBuf {
    root.join(CATALOG_FILE_NAME)
}

pub fn root_url(root: &Path) -> Result<Url> {
    Url::from_directory_path(root).map_err(|_| CaveError::InvalidUrl(root.display().to_string()))
}

/// Creates the storage root if needed and returns its canonical path.
pub fn ensure_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        std::fs::create_dir_all(root).map_err(|e| CaveError::io(root, e))?;
        tracing::debug!(path = %root.display(), "repository location created");
    }
    let canonical = std::fs::canonicalize(root).map_err(|e| CaveError::io(root, e))?;
    if !canonical.is_dir() {
        return Err(CaveError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    Ok(canonical)
}

/// Prepares the storage root and the initial catalog.
///
/// The catalog document is read eagerly but best-effort: a present but
/// unreadable `repository.xml` is treated as absent and the repository
/// starts from an empty catalog.
pub fn ensure(name: &str, root: &Path) -> Result<(PathBuf, Catalog)> {
    tracing::debug!(repository = name, "preparing repository folder");
    let root = ensure_root(root)?;
    let document_path = catalog_document_path(&root);
    let url = root_url(&root)?;

    let document = if document_path.exists() {
        match codec::read(&document_path) {
            Ok(document) => document,
            Err(e @ CaveError::Parse { .. }) => {
                tracing::warn!(
                    repository = name,
                    error = %e,
                    "ignoring unreadable catalog document, starting empty"
                );
                CatalogDocument::empty(name)
            }
            Err(e) => return Err(e),
        }
    } else {
        CatalogDocument::empty(name)
    };

    Ok((root, Catalog::with_document(url, document_path, document)))
}

/// Removes the storage root and everything below it.
pub fn remove_root(root: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(root).map_err(|e| CaveError::io(root, e))
}
