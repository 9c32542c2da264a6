//! The artifact index of one repository.
//!
//! All mutation goes through an exclusive write lock; serialization and
//! listing take the shared read lock. The lock only guards this process:
//! two processes pointed at the same storage root can still race on
//! `repository.xml`.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

use crate::codec;
use crate::error::Result;
use crate::record::ArtifactRecord;

/// In-memory form of `repository.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDocument {
    pub name: String,
    pub increment: u64,
    pub resources: Vec<ArtifactRecord>,
}

impl CatalogDocument {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            increment: 0,
            resources: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Catalog {
    name: String,
    root: Url,
    document_path: PathBuf,
    state: RwLock<Option<CatalogDocument>>,
    // Serializes writers of the document file; state is still read shared.
    persist: Mutex<()>,
}

impl Catalog {
    /// A catalog that reads `document_path` on first access.
    pub fn attach(name: impl Into<String>, root: Url, document_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
            document_path,
            state: RwLock::new(None),
            persist: Mutex::new(()),
        }
    }

    /// A catalog that is already loaded with `document`.
    pub fn with_document(root: Url, document_path: PathBuf, document: CatalogDocument) -> Self {
        Self {
            name: document.name.clone(),
            root,
            document_path,
            state: RwLock::new(Some(document)),
            persist: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub(crate) fn rebase(&mut self, root: Url, document_path: PathBuf) {
        self.root = root;
        self.document_path = document_path;
    }

    /// Loads the persisted document once. Later calls are no-ops.
    ///
    /// A missing document yields an empty catalog named after the repository;
    /// a malformed one is a [`crate::CaveError::Parse`].
    pub fn load(&self) -> Result<()> {
        if self.state.read().is_some() {
            return Ok(());
        }
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(());
        }
        let document = if self.document_path.exists() {
            codec::read(&self.document_path)?
        } else {
            CatalogDocument::empty(self.name.clone())
        };
        tracing::debug!(
            path = %self.document_path.display(),
            resources = document.resources.len(),
            "catalog loaded"
        );
        *state = Some(document);
        Ok(())
    }

    /// Relativizes and appends `record`. `None` ("not an artifact") is a no-op.
    pub fn add(&self, record: Option<ArtifactRecord>) -> Result<bool> {
        let Some(mut record) = record else {
            return Ok(false);
        };
        record.relativize(&self.root);
        let mut guard = self.write()?;
        let document = document_mut(&mut guard);
        tracing::debug!(
            symbolic_name = %record.symbolic_name,
            version = %record.version,
            uri = %record.uri,
            "resource added"
        );
        document.resources.push(record);
        document.increment = next_increment(document.increment);
        Ok(true)
    }

    pub fn increment(&self) -> Result<u64> {
        Ok(document(&*self.read()?).increment)
    }

    pub fn set_increment(&self, increment: u64) -> Result<()> {
        let mut guard = self.write()?;
        document_mut(&mut guard).increment = increment;
        Ok(())
    }

    pub fn name(&self) -> Result<String> {
        Ok(document(&*self.read()?).name.clone())
    }

    pub fn resources(&self) -> Result<Vec<ArtifactRecord>> {
        Ok(document(&*self.read()?).resources.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(document(&*self.read()?).resources.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn snapshot(&self) -> Result<CatalogDocument> {
        Ok(document(&*self.read()?).clone())
    }

    /// Rewrites the persisted document from the current state.
    pub fn persist(&self) -> Result<()> {
        let _writer = self.persist.lock();
        let guard = self.read()?;
        let document = document(&guard);
        codec::write(document, &self.document_path)?;
        tracing::debug!(
            path = %self.document_path.display(),
            resources = document.resources.len(),
            increment = document.increment,
            "catalog persisted"
        );
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<CatalogDocument>>> {
        self.load()?;
        Ok(self.state.read())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<CatalogDocument>>> {
        self.load()?;
        Ok(self.state.write())
    }
}

// The guards below are only handed out after `load` has filled the state.
fn document<'a>(state: &'a Option<CatalogDocument>) -> &'a CatalogDocument {
    match state {
        Some(document) => document,
        None => unreachable!("catalog state read before load"),
    }
}

fn document_mut<'a>(state: &'a mut Option<CatalogDocument>) -> &'a mut CatalogDocument {
    match state {
        Some(document) => document,
        None => unreachable!("catalog state written before load"),
    }
}

fn next_increment(previous: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    now.max(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaveError;
    use std::sync::Arc;

    fn root_of(dir: &Path) -> Url {
        Url::from_directory_path(dir).unwrap()
    }

    fn catalog_in(dir: &Path) -> Catalog {
        Catalog::attach("main", root_of(dir), dir.join("repository.xml"))
    }

    #[test]
    fn add_relativizes_local_and_keeps_remote_uris() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = catalog_in(dir.path());
        let local = format!("{}a-1.0.0.jar", root_of(dir.path()));

        catalog.add(Some(ArtifactRecord::new("a", "1.0.0", local)))?;
        catalog.add(Some(ArtifactRecord::new("b", "2.0.0", "http://repo.example.org/b.jar")))?;

        let uris: Vec<_> = catalog.resources()?.into_iter().map(|r| r.uri).collect();
        assert_eq!(uris, vec!["a-1.0.0.jar", "http://repo.example.org/b.jar"]);
        Ok(())
    }

    #[test]
    fn add_none_is_a_noop() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = catalog_in(dir.path());

        assert!(!catalog.add(None)?);
        assert_eq!(catalog.len()?, 0);
        assert_eq!(catalog.increment()?, 0);
        Ok(())
    }

    #[test]
    fn increment_never_decreases() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = catalog_in(dir.path());
        catalog.set_increment(u64::MAX - 1)?;

        let mut last = catalog.increment()?;
        for i in 0..5 {
            catalog.add(Some(ArtifactRecord::new(format!("a{i}"), "1", "x.jar")))?;
            let now = catalog.increment()?;
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, u64::MAX - 1);
        Ok(())
    }

    #[test]
    fn add_bumps_increment_from_zero() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = catalog_in(dir.path());
        catalog.add(Some(ArtifactRecord::new("a", "1", "a.jar")))?;
        assert!(catalog.increment()? > 0);
        Ok(())
    }

    #[test]
    fn load_is_lazy_and_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("repository.xml");
        let mut doc = CatalogDocument::empty("persisted");
        doc.increment = 7;
        doc.resources.push(ArtifactRecord::new("a", "1", "a.jar"));
        codec::write(&doc, &path)?;

        let catalog = catalog_in(dir.path());
        assert_eq!(catalog.name()?, "persisted");
        assert_eq!(catalog.increment()?, 7);

        std::fs::remove_file(&path)?;
        catalog.load()?;
        assert_eq!(catalog.len()?, 1);
        Ok(())
    }

    #[test]
    fn lazy_load_of_corrupt_document_propagates_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("repository.xml"), "<repository increment=\"x\"/>")?;

        let catalog = catalog_in(dir.path());
        assert!(matches!(catalog.increment(), Err(CaveError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn persist_writes_current_state() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = catalog_in(dir.path());
        catalog.add(Some(ArtifactRecord::new("a", "1", "a.jar")))?;
        catalog.persist()?;

        let back = codec::read(catalog.document_path())?;
        assert_eq!(back, catalog.snapshot()?);
        Ok(())
    }

    #[test]
    fn concurrent_adds_are_all_recorded() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = Arc::new(catalog_in(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let record = ArtifactRecord::new(format!("t{t}.a{i}"), "1", "x.jar");
                        catalog.add(Some(record)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(catalog.len()?, 200);
        Ok(())
    }
}
