use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// One indexed artifact: identity, location and whatever else the extractor found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub symbolic_name: String,
    pub version: String,
    pub uri: String,
    pub attributes: BTreeMap<String, String>,
}

impl ArtifactRecord {
    pub fn new(
        symbolic_name: impl Into<String>,
        version: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            uri: uri.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// `<symbolic-name>-<version>`, the stem of the canonical upload file name.
    pub fn canonical_stem(&self) -> String {
        format!("{}-{}", self.symbolic_name, self.version)
    }

    /// Rewrites the URI relative to `root` when it lives under it.
    ///
    /// `root` is a directory URL and always ends with `/`, so the stored
    /// suffix never starts with a separator.
    pub fn relativize(&mut self, root: &Url) -> bool {
        let Some(suffix) = self.uri.strip_prefix(root.as_str()) else {
            return false;
        };
        if suffix.is_empty() {
            return false;
        }
        tracing::debug!(from = %self.uri, to = suffix, "relativized resource uri");
        self.uri = suffix.to_string();
        true
    }
}
