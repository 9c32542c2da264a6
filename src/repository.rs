//! A named repository owning one storage root and its catalog.
//!
//! Every public operation is a blocking call. Operations on one instance may
//! run from several threads at once; the catalog lock serializes mutation.
//! There is no cross-process locking, so one writer process per storage root
//! is a precondition.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::config::RepositoryOptions;
use crate::error::Result;
use crate::extract::{ManifestExtractor, MetadataExtractor};
use crate::fetch::{HttpTransport, Transport};
use crate::layout;
use crate::links::{AnchorLister, LinkLister};
use crate::proxy::Proxy;
use crate::record::ArtifactRecord;
use crate::scan;
use crate::upload::Upload;

pub struct Repository {
    name: String,
    location: PathBuf,
    catalog: Catalog,
    options: RepositoryOptions,
    extractor: Arc<dyn MetadataExtractor>,
    transport: Arc<dyn Transport>,
    links: Arc<dyn LinkLister>,
}

pub struct RepositoryBuilder {
    name: String,
    location: PathBuf,
    options: RepositoryOptions,
    extractor: Option<Arc<dyn MetadataExtractor>>,
    transport: Option<Arc<dyn Transport>>,
    links: Option<Arc<dyn LinkLister>>,
}

impl RepositoryBuilder {
    pub fn options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn scan_on_init(mut self, scan: bool) -> Self {
        self.options.scan_on_init = scan;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn link_lister(mut self, links: Arc<dyn LinkLister>) -> Self {
        self.links = Some(links);
        self
    }

    /// Ensures the storage root, loads or initializes the catalog and
    /// optionally runs the initial scan.
    pub fn open(self) -> Result<Repository> {
        let (location, catalog) = layout::ensure(&self.name, &self.location)?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let repository = Repository {
            name: self.name,
            location,
            catalog,
            options: self.options,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(ManifestExtractor)),
            transport,
            links: self.links.unwrap_or_else(|| Arc::new(AnchorLister)),
        };
        if repository.options.scan_on_init {
            repository.scan()?;
        }
        Ok(repository)
    }
}

impl Repository {
    pub fn builder(name: impl Into<String>, location: impl Into<PathBuf>) -> RepositoryBuilder {
        RepositoryBuilder {
            name: name.into(),
            location: location.into(),
            options: RepositoryOptions::default(),
            extractor: None,
            transport: None,
            links: None,
        }
    }

    pub fn new(
        name: impl Into<String>,
        location: impl Into<PathBuf>,
        scan_on_init: bool,
    ) -> Result<Self> {
        Self::builder(name, location).scan_on_init(scan_on_init).open()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the repository. The catalog is not re-indexed.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Points the repository at another storage root. Later additions are
    /// relativized against it; nothing is moved or re-indexed.
    pub fn set_location(&mut self, location: impl Into<PathBuf>) -> Result<()> {
        let location = location.into();
        let root = layout::root_url(&location)?;
        self.catalog
            .rebase(root, layout::catalog_document_path(&location));
        self.location = location;
        Ok(())
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fetches one artifact into the storage root and persists the catalog.
    /// Non-artifact content is discarded and yields `None`.
    pub fn upload(&self, url: &Url) -> Result<Option<ArtifactRecord>> {
        let record = Upload {
            root: &self.location,
            catalog: &self.catalog,
            extractor: self.extractor.as_ref(),
            transport: self.transport.as_ref(),
        }
        .run(url)?;
        if record.is_some() {
            self.catalog.persist()?;
        }
        Ok(record)
    }

    /// Re-indexes every artifact under the storage root and persists.
    pub fn scan(&self) -> Result<()> {
        self.scan_with(&CancelToken::new())
    }

    pub fn scan_with(&self, cancel: &CancelToken) -> Result<()> {
        let added =
            scan::index_tree(&self.catalog, self.extractor.as_ref(), &self.location, cancel)?;
        self.catalog.persist()?;
        tracing::info!(repository = %self.name, added, "scan complete");
        Ok(())
    }

    /// Registers artifacts found under `url` (a `file:` tree or an HTTP
    /// index page tree) and persists once at the end.
    pub fn proxy(&self, url: &Url) -> Result<()> {
        self.proxy_with(url, &CancelToken::new())
    }

    pub fn proxy_with(&self, url: &Url, cancel: &CancelToken) -> Result<()> {
        let added = Proxy {
            catalog: &self.catalog,
            extractor: self.extractor.as_ref(),
            transport: self.transport.as_ref(),
            links: self.links.as_ref(),
            cancel,
            max_depth: self.options.max_proxy_depth,
            max_content_size: self.options.max_content_size,
        }
        .run(url)?;
        self.catalog.persist()?;
        tracing::info!(repository = %self.name, %url, added, "proxy complete");
        Ok(())
    }

    pub fn increment(&self) -> Result<u64> {
        self.catalog.increment()
    }

    pub fn catalog_document_path(&self) -> PathBuf {
        layout::catalog_document_path(&self.location)
    }

    pub fn catalog_document_location(&self) -> Result<Url> {
        crate::extract::file_url(&self.catalog_document_path())
    }

    /// Deletes the storage root with all of its content.
    pub fn cleanup(self) -> Result<()> {
        layout::remove_root(&self.location)?;
        tracing::info!(
            repository = %self.name,
            path = %self.location.display(),
            "repository removed"
        );
        Ok(())
    }
}
