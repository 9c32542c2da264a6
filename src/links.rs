//! Hyperlink extraction from HTML index pages.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait LinkLister: Send + Sync {
    /// Absolute link targets of `html`, in document order.
    fn list_links(&self, html: &str, base: &Url) -> Vec<Url>;
}

/// Collects the `href` of every `<a>` element, resolved against the page URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnchorLister;

fn anchor_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .expect("anchor pattern is valid")
    })
}

impl LinkLister for AnchorLister {
    fn list_links(&self, html: &str, base: &Url) -> Vec<Url> {
        anchor_href()
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter_map(|href| base.join(&href).ok())
            .collect()
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute_links_in_order() {
        let base = Url::parse("http://repo.example.org/bundles/").unwrap();
        let html = r#"
            <html><body>
            <A HREF="../">Parent Directory</A>
            <a href='a-1.0.jar'>a</a>
            <a class="x" href=b/>b</a>
            <a href="http://mirror.example.org/c.jar?x=1&amp;y=2">c</a>
            <a name="anchor-only">no href</a>
            </body></html>"#;

        let links: Vec<String> = AnchorLister
            .list_links(html, &base)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            links,
            vec![
                "http://repo.example.org/",
                "http://repo.example.org/bundles/a-1.0.jar",
                "http://repo.example.org/bundles/b/",
                "http://mirror.example.org/c.jar?x=1&y=2",
            ]
        );
    }

    #[test]
    fn page_without_links_yields_nothing() {
        let base = Url::parse("http://repo.example.org/").unwrap();
        assert!(AnchorLister.list_links("<p>empty</p>", &base).is_empty());
    }
}
