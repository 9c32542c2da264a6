//! Single-artifact upload into the storage root.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

use crate::catalog::Catalog;
use crate::error::{CaveError, Result};
use crate::extract::{MetadataExtractor, extract_file};
use crate::fetch::{self, Transport};
use crate::record::ArtifactRecord;

pub const DEFAULT_EXTENSION: &str = "jar";

pub struct Upload<'a> {
    pub root: &'a Path,
    pub catalog: &'a Catalog,
    pub extractor: &'a dyn MetadataExtractor,
    pub transport: &'a dyn Transport,
}

impl Upload<'_> {
    /// Copies `source` into the root under its canonical name and registers it.
    ///
    /// Returns `None`, leaving no file behind, when the content is not an
    /// artifact. The catalog is not persisted here.
    pub fn run(&self, source: &Url) -> Result<Option<ArtifactRecord>> {
        tracing::debug!(%source, "uploading artifact");
        let temp = self.download(source)?;

        let Some(candidate) = extract_file(self.extractor, &temp).inspect_err(|_| {
            let _ = std::fs::remove_file(&temp);
        })?
        else {
            let _ = std::fs::remove_file(&temp);
            tracing::warn!(%source, "upload source is not a valid artifact");
            return Ok(None);
        };

        let file_name = format!("{}.{}", candidate.canonical_stem(), extension_of(source));
        if !is_plain_file_name(&file_name) {
            let _ = std::fs::remove_file(&temp);
            tracing::warn!(
                %source,
                file_name = %file_name,
                "artifact identity is not a plain file name"
            );
            return Ok(None);
        }
        let destination = self.root.join(file_name);
        std::fs::rename(&temp, &destination).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            CaveError::io(&destination, e)
        })?;

        let Some(record) = extract_file(self.extractor, &destination)? else {
            let _ = std::fs::remove_file(&destination);
            tracing::warn!(path = %destination.display(), "artifact unreadable after rename");
            return Ok(None);
        };
        self.catalog.add(Some(record.clone()))?;
        tracing::info!(
            symbolic_name = %record.symbolic_name,
            version = %record.version,
            path = %destination.display(),
            "artifact uploaded"
        );
        Ok(Some(record))
    }

    /// Streams `source` into a fresh temporary file under the root. A failed
    /// transfer removes its partial file.
    fn download(&self, source: &Url) -> Result<PathBuf> {
        let mut reader = fetch::open(source, self.transport)?;
        let (temp, file) = self.create_temp()?;
        if let Err(e) = copy_into(&mut reader, file, &temp, source) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        Ok(temp)
    }

    /// Claims `artifact-<millis>[-n]`, skipping names another upload holds.
    fn create_temp(&self) -> Result<(PathBuf, File)> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut n = 0u32;
        loop {
            let name = if n == 0 {
                format!("artifact-{millis}")
            } else {
                format!("artifact-{millis}-{n}")
            };
            let path = self.root.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(CaveError::io(&path, e)),
            }
        }
    }
}

fn copy_into(reader: &mut dyn Read, file: File, temp: &Path, source: &Url) -> Result<()> {
    let mut writer = BufWriter::new(file);
    std::io::copy(reader, &mut writer).map_err(|e| match source.scheme() {
        "file" => CaveError::io(temp, e),
        _ => CaveError::network(source.as_str(), e),
    })?;
    writer.flush().map_err(|e| CaveError::io(temp, e))
}

/// A single path component that cannot climb out of the root.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    ) && !name.contains(['/', '\\'])
}

/// Extension of the last path segment when it looks like one, else `jar`.
pub fn extension_of(source: &Url) -> String {
    source
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| Path::new(segment).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            (1..=8).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
