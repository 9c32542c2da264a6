//! Artifact identity extraction.
//!
//! The repository only needs "identity + version, or not an artifact" from a
//! byte source; [`MetadataExtractor`] is that seam. [`ManifestExtractor`]
//! reads OSGi bundle headers from a jar's `META-INF/MANIFEST.MF`.

use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use url::Url;
use zip::ZipArchive;

use crate::error::{CaveError, Result};
use crate::record::ArtifactRecord;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const SYMBOLIC_NAME_HEADER: &str = "Bundle-SymbolicName";
pub const VERSION_HEADER: &str = "Bundle-Version";
pub const DEFAULT_VERSION: &str = "0.0.0";

pub trait MetadataExtractor: Send + Sync {
    /// Returns `Ok(None)` when `content` is not a recognizable artifact.
    /// The record's URI is `source`.
    fn extract(&self, source: &Url, content: &[u8]) -> Result<Option<ArtifactRecord>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestExtractor;

impl MetadataExtractor for ManifestExtractor {
    fn extract(&self, source: &Url, content: &[u8]) -> Result<Option<ArtifactRecord>> {
        let Ok(mut archive) = ZipArchive::new(Cursor::new(content)) else {
            return Ok(None);
        };
        let Ok(mut entry) = archive.by_name(MANIFEST_PATH) else {
            return Ok(None);
        };
        let mut raw = Vec::new();
        if entry.read_to_end(&mut raw).is_err() {
            return Ok(None);
        }

        let mut headers = parse_manifest(&String::from_utf8_lossy(&raw));
        let Some(symbolic_name) = headers
            .remove(SYMBOLIC_NAME_HEADER)
            .map(|v| strip_directives(&v).to_string())
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };
        let version = headers
            .remove(VERSION_HEADER)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        headers.insert("size".to_string(), content.len().to_string());

        Ok(Some(ArtifactRecord {
            symbolic_name,
            version,
            uri: source.to_string(),
            attributes: headers,
        }))
    }
}

/// Runs `extractor` over a local file, bound to the file's absolute URL.
pub fn extract_file(
    extractor: &dyn MetadataExtractor,
    path: &Path,
) -> Result<Option<ArtifactRecord>> {
    let source = file_url(path)?;
    let file = File::open(path).map_err(|e| CaveError::io(path, e))?;
    let len = file.metadata().map_err(|e| CaveError::io(path, e))?.len();
    if len == 0 {
        return Ok(None);
    }
    // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
    // The mmap is dropped before the file, ensuring memory safety.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| CaveError::io(path, e))?;
    extractor.extract(&source, &mmap[..])
}

pub fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|_| CaveError::InvalidUrl(path.display().to_string()))
}

/// Main-section headers of a jar manifest. Lines starting with a single space
/// continue the previous header value.
fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((key, value)) = current.take() {
            headers.insert(key, value);
        }
        if let Some((key, value)) = line.split_once(':') {
            current = Some((key.trim().to_string(), value.trim_start().to_string()));
        }
    }
    if let Some((key, value)) = current {
        headers.insert(key, value);
    }
    headers
}

fn strip_directives(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}
