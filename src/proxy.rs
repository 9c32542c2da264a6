//! Proxy (mirror) traversal: registers artifacts found at another location
//! without copying them into the storage root.

use std::collections::HashSet;
use url::Url;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::error::{CaveError, Result};
use crate::extract::MetadataExtractor;
use crate::fetch::Transport;
use crate::links::LinkLister;
use crate::scan;

pub struct Proxy<'a> {
    pub catalog: &'a Catalog,
    pub extractor: &'a dyn MetadataExtractor,
    pub transport: &'a dyn Transport,
    pub links: &'a dyn LinkLister,
    pub cancel: &'a CancelToken,
    pub max_depth: usize,
    pub max_content_size: u64,
}

impl Proxy<'_> {
    /// Dispatches on the URL scheme and returns the number of artifacts added.
    pub fn run(&self, url: &Url) -> Result<usize> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| CaveError::InvalidUrl(url.to_string()))?;
                tracing::debug!(path = %path.display(), "proxying filesystem");
                scan::index_tree(self.catalog, self.extractor, &path, self.cancel)
            }
            "http" | "https" => {
                let mut visited = HashSet::new();
                self.http(url, 0, &mut visited)
            }
            scheme => Err(CaveError::UnsupportedScheme {
                scheme: scheme.to_string(),
                url: url.to_string(),
            }),
        }
    }

    fn http(&self, url: &Url, depth: usize, visited: &mut HashSet<Url>) -> Result<usize> {
        self.cancel.check()?;
        if !visited.insert(normalize(url)) {
            tracing::debug!(%url, "already visited");
            return Ok(0);
        }
        tracing::debug!(%url, depth, "proxying HTTP URL");

        let fetched = self.transport.get(url)?;
        visited.insert(normalize(&fetched.url));
        let page_url = fetched.url.clone();

        if fetched.is_archive() {
            let content = fetched.read_body(self.max_content_size)?;
            return match self.extractor.extract(&page_url, &content)? {
                Some(record) => {
                    self.catalog.add(Some(record))?;
                    Ok(1)
                }
                None => {
                    tracing::warn!(url = %page_url, "not a valid artifact, skipped");
                    Ok(0)
                }
            };
        }

        let content = fetched.read_body(self.max_content_size)?;
        if depth >= self.max_depth {
            tracing::warn!(url = %page_url, depth, "proxy depth limit reached, links not followed");
            return Ok(0);
        }

        let html = String::from_utf8_lossy(&content);
        let mut added = 0usize;
        // The first link of a directory index is its parent.
        for link in self.links.list_links(&html, &page_url).into_iter().skip(1) {
            if !matches!(link.scheme(), "http" | "https") {
                tracing::debug!(%link, "skipping non-HTTP link");
                continue;
            }
            match self.http(&link, depth + 1, visited) {
                Ok(n) => added += n,
                Err(e) if e.is_remote() => {
                    tracing::warn!(%link, error = %e, "failed to proxy link, skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }
}

fn normalize(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ManifestExtractor;
    use crate::extract::tests::write_bundle;
    use crate::fetch::tests::FakeTransport;
    use crate::layout;
    use crate::links::AnchorLister;

    const JAR: &str = "application/java-archive";
    const HTML: &str = "text/html; charset=utf-8";

    fn bundle_bytes(name: &str, version: &str) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jar");
        write_bundle(&path, name, version).unwrap();
        std::fs::read(path).unwrap()
    }

    fn run(transport: &FakeTransport, url: &str, max_depth: usize) -> (Result<usize>, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let (_, catalog) = layout::ensure("main", dir.path()).unwrap();
        let cancel = CancelToken::new();
        let result = Proxy {
            catalog: &catalog,
            extractor: &ManifestExtractor,
            transport,
            links: &AnchorLister,
            cancel: &cancel,
            max_depth,
            max_content_size: 1024 * 1024,
        }
        .run(&Url::parse(url).unwrap());
        (result, catalog)
    }

    #[test]
    fn follows_index_links_skipping_parent() {
        let transport = FakeTransport::default()
            .serve(
                "http://repo.example.org/bundles/",
                HTML,
                r#"<a href="../">Parent</a><a href="a.jar">a</a><a href="b.jar">b</a>"#,
            )
            .serve("http://repo.example.org/bundles/a.jar", JAR, bundle_bytes("org.a", "1.0.0"))
            .serve("http://repo.example.org/bundles/b.jar", JAR, bundle_bytes("org.b", "2.0.0"));

        let (result, catalog) = run(&transport, "http://repo.example.org/bundles/", 8);
        assert_eq!(result.unwrap(), 2);

        let uris: Vec<_> = catalog.resources().unwrap().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            uris,
            vec![
                "http://repo.example.org/bundles/a.jar",
                "http://repo.example.org/bundles/b.jar"
            ]
        );
        assert!(!transport.requests.lock().iter().any(|u| u == "http://repo.example.org/"));
    }

    #[test]
    fn cycles_terminate() {
        let transport = FakeTransport::default()
            .serve(
                "http://repo.example.org/a/",
                HTML,
                r#"<a href="../">up</a><a href="/b/">b</a>"#,
            )
            .serve(
                "http://repo.example.org/b/",
                HTML,
                r#"<a href="../">up</a><a href="/a/#top">a</a><a href="x.jar">x</a>"#,
            )
            .serve("http://repo.example.org/b/x.jar", JAR, bundle_bytes("org.x", "1.0.0"));

        let (result, catalog) = run(&transport, "http://repo.example.org/a/", 8);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(catalog.len().unwrap(), 1);
        let hits = transport
            .requests
            .lock()
            .iter()
            .filter(|u| u.as_str() == "http://repo.example.org/a/")
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn depth_limit_stops_descent() {
        let transport = FakeTransport::default()
            .serve("http://repo.example.org/", HTML, r#"<a href="..">p</a><a href="d/">d</a>"#)
            .serve("http://repo.example.org/d/", HTML, r#"<a href="..">p</a><a href="x.jar">x</a>"#)
            .serve("http://repo.example.org/d/x.jar", JAR, bundle_bytes("org.x", "1.0.0"));

        let (result, catalog) = run(&transport, "http://repo.example.org/", 1);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(catalog.len().unwrap(), 0);
    }

    #[test]
    fn broken_child_link_does_not_abort_siblings() {
        let transport = FakeTransport::default()
            .serve(
                "http://repo.example.org/",
                HTML,
                r#"<a href="..">p</a><a href="missing.jar">m</a><a href="junk.bin">j</a><a href="ok.jar">ok</a>"#,
            )
            .serve("http://repo.example.org/junk.bin", "application/octet-stream", b"junk".to_vec())
            .serve("http://repo.example.org/ok.jar", JAR, bundle_bytes("org.ok", "1.0.0"));

        let (result, catalog) = run(&transport, "http://repo.example.org/", 8);
        assert_eq!(result.unwrap(), 1);
        assert_eq!(catalog.resources().unwrap()[0].symbolic_name, "org.ok");
    }

    #[test]
    fn top_level_failure_propagates() {
        let transport = FakeTransport::default();
        let (result, _) = run(&transport, "http://repo.example.org/", 8);
        assert!(matches!(result, Err(CaveError::HttpStatus { status: 404, .. })));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let transport = FakeTransport::default();
        let (result, _) = run(&transport, "ftp://repo.example.org/", 8);
        assert!(matches!(result, Err(CaveError::UnsupportedScheme { .. })));
    }
}
