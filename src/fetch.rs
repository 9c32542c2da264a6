//! Byte sources for upload and proxy.
//!
//! `file:` URLs are opened directly; `http`/`https` go through a
//! [`Transport`], which is the seam tests replace with an in-memory fake.

use reqwest::blocking::Client;
use std::fs::File;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::error::{CaveError, Result};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Content types that mark an HTTP response as a candidate artifact rather
/// than an index page.
pub const ARCHIVE_CONTENT_TYPES: &[&str] = &[
    "application/java-archive",
    "application/x-java-archive",
    "application/octet-stream",
    "application/zip",
];

/// An opened remote resource.
pub struct Fetched {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Box<dyn Read + Send>,
}

impl Fetched {
    /// True when the `Content-Type` essence is one of [`ARCHIVE_CONTENT_TYPES`].
    pub fn is_archive(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .is_some_and(|essence| ARCHIVE_CONTENT_TYPES.contains(&essence.as_str()))
    }

    /// Reads the whole body, failing once it exceeds `max` bytes.
    pub fn read_body(self, max: u64) -> Result<Vec<u8>> {
        let url = self.url.to_string();
        let mut content = Vec::new();
        self.body
            .take(max + 1)
            .read_to_end(&mut content)
            .map_err(|e| CaveError::network(url.clone(), e))?;
        if content.len() as u64 > max {
            return Err(CaveError::ContentTooLarge {
                url,
                size: content.len() as u64,
                max,
            });
        }
        Ok(content)
    }
}

pub trait Transport: Send + Sync {
    fn get(&self, url: &Url) -> Result<Fetched>;
}

/// Blocking HTTP client used outside of tests.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("artifact-cave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CaveError::network("<client>", e))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Fetched> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| CaveError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaveError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let final_url = response.url().clone();

        Ok(Fetched {
            url: final_url,
            content_type,
            body: Box::new(response),
        })
    }
}

/// Opens `url` for reading, whatever its scheme.
pub fn open(url: &Url, transport: &dyn Transport) -> Result<Box<dyn Read + Send>> {
    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| CaveError::InvalidUrl(url.to_string()))?;
            let file = File::open(&path).map_err(|e| CaveError::io(path, e))?;
            Ok(Box::new(file))
        }
        "http" | "https" => Ok(transport.get(url)?.body),
        scheme => Err(CaveError::UnsupportedScheme {
            scheme: scheme.to_string(),
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::io::Cursor;

    /// In-memory HTTP: URL -> (content type, body). Unknown URLs are 404s.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pages: HashMap<String, (String, Vec<u8>)>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        pub(crate) fn serve(
            mut self,
            url: &str,
            content_type: &str,
            body: impl Into<Vec<u8>>,
        ) -> Self {
            self.pages
                .insert(url.to_string(), (content_type.to_string(), body.into()));
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &Url) -> Result<Fetched> {
            self.requests.lock().push(url.to_string());
            let Some((content_type, body)) = self.pages.get(url.as_str()) else {
                return Err(CaveError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                });
            };
            Ok(Fetched {
                url: url.clone(),
                content_type: Some(content_type.clone()),
                body: Box::new(Cursor::new(body.clone())),
            })
        }
    }

    fn fetched(content_type: Option<&str>, body: &[u8]) -> Fetched {
        Fetched {
            url: Url::parse("http://repo.example.org/x").unwrap(),
            content_type: content_type.map(String::from),
            body: Box::new(Cursor::new(body.to_vec())),
        }
    }

    #[test]
    fn archive_content_types_ignore_parameters_and_case() {
        assert!(fetched(Some("application/java-archive"), b"").is_archive());
        assert!(fetched(Some("Application/Octet-Stream; charset=binary"), b"").is_archive());
        assert!(!fetched(Some("text/html; charset=utf-8"), b"").is_archive());
        assert!(!fetched(None, b"").is_archive());
    }

    #[test]
    fn read_body_enforces_limit() {
        assert_eq!(fetched(None, b"abcd").read_body(4).unwrap(), b"abcd");
        let err = fetched(None, b"abcde").read_body(4).unwrap_err();
        assert!(matches!(err, CaveError::ContentTooLarge { size: 5, max: 4, .. }));
    }

    #[test]
    fn open_reads_local_files_and_rejects_unknown_schemes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"payload")?;
        let transport = FakeTransport::default();

        let mut content = Vec::new();
        open(&Url::from_file_path(&path).unwrap(), &transport)?.read_to_end(&mut content)?;
        assert_eq!(content, b"payload");

        let err = open(&Url::parse("ftp://host/a.jar")?, &transport)
            .err()
            .expect("unsupported scheme");
        assert!(matches!(err, CaveError::UnsupportedScheme { .. }));
        Ok(())
    }
}
