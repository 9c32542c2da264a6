//! Local filesystem traversal: repository scan and filesystem proxy.

use ignore::WalkBuilder;
use std::io::ErrorKind;
use std::path::Path;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::error::{CaveError, Result};
use crate::extract::{MetadataExtractor, extract_file};
use crate::layout::CATALOG_FILE_NAME;

/// Visits every regular file under `base` (or `base` itself when it is a
/// file), children sorted by name.
///
/// Symlinks are followed; a link back to an ancestor directory is reported
/// by the walker as a loop and skipped.
pub fn walk_files(
    base: &Path,
    cancel: &CancelToken,
    mut visit: impl FnMut(&Path) -> Result<()>,
) -> Result<()> {
    if !base.exists() {
        return Err(CaveError::io(
            base,
            std::io::Error::new(ErrorKind::NotFound, "no such file or directory"),
        ));
    }

    let walker = WalkBuilder::new(base)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        cancel.check()?;
        let entry = match entry {
            Ok(entry) => entry,
            // Loops, dangling links and entries removed mid-walk.
            Err(err) if err.io_error().is_none_or(|e| e.kind() == ErrorKind::NotFound) => {
                tracing::warn!(error = %err, "skipping entry");
                continue;
            }
            Err(err) => {
                return Err(CaveError::Walk {
                    path: base.to_path_buf(),
                    detail: err.to_string(),
                });
            }
        };
        if entry.file_type().is_some_and(|t| t.is_file()) {
            visit(entry.path())?;
        }
    }
    Ok(())
}

/// Indexes every artifact found under `base` into `catalog`.
///
/// Files the extractor does not recognize are skipped with a warning. URIs
/// under the catalog root become relative; anything else keeps its absolute
/// `file:` URL, which is how a filesystem proxy references foreign trees
/// without copying them.
pub fn index_tree(
    catalog: &Catalog,
    extractor: &dyn MetadataExtractor,
    base: &Path,
    cancel: &CancelToken,
) -> Result<usize> {
    let mut added = 0usize;
    walk_files(base, cancel, |path| {
        if is_catalog_file(path) {
            return Ok(());
        }
        tracing::debug!(path = %path.display(), "inspecting");
        match extract_file(extractor, path) {
            Ok(Some(record)) => {
                catalog.add(Some(record))?;
                added += 1;
            }
            Ok(None) => {
                tracing::warn!(path = %path.display(), "not a valid artifact, skipped");
            }
            // Renamed or removed by a concurrent upload after it was listed.
            Err(CaveError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "file vanished, skipped");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    })?;
    Ok(added)
}

/// `repository.xml` and its in-flight temp file are never artifacts and may
/// be rewritten while a walk is running.
fn is_catalog_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| {
            n == CATALOG_FILE_NAME || n.strip_suffix(".tmp") == Some(CATALOG_FILE_NAME)
        })
}
