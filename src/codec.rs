//! `repository.xml` reader and writer.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogDocument;
use crate::error::{CaveError, Result};
use crate::record::ArtifactRecord;

const REPOSITORY_TAG: &[u8] = b"repository";
const RESOURCE_TAG: &[u8] = b"resource";
const PROPERTY_TAG: &[u8] = b"p";

/// Fully rewrites `destination` with `document`.
///
/// Output goes to a sibling `.tmp` file which is flushed and then renamed
/// over the destination, so readers never observe a half-written catalog.
pub fn write(document: &CatalogDocument, destination: &Path) -> Result<()> {
    let tmp = tmp_path(destination);
    let result = write_to(document, &tmp);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, destination).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        CaveError::io(destination, e)
    })
}

fn write_to(document: &CatalogDocument, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| CaveError::io(path, e))?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    let xml_err = |e| write_error(path, e);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let increment = document.increment.to_string();
    let mut root = BytesStart::new("repository");
    root.push_attribute(("name", document.name.as_str()));
    root.push_attribute(("increment", increment.as_str()));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    for resource in &document.resources {
        let mut elem = BytesStart::new("resource");
        elem.push_attribute(("symbolicname", resource.symbolic_name.as_str()));
        elem.push_attribute(("version", resource.version.as_str()));
        elem.push_attribute(("uri", resource.uri.as_str()));

        if resource.attributes.is_empty() {
            writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
            continue;
        }
        writer.write_event(Event::Start(elem)).map_err(xml_err)?;
        for (key, value) in &resource.attributes {
            let mut prop = BytesStart::new("p");
            prop.push_attribute(("n", key.as_str()));
            prop.push_attribute(("v", value.as_str()));
            writer.write_event(Event::Empty(prop)).map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("resource")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("repository")))
        .map_err(xml_err)?;

    let mut out = writer.into_inner();
    out.write_all(b"\n").map_err(|e| CaveError::io(path, e))?;
    let file = out
        .into_inner()
        .map_err(|e| CaveError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| CaveError::io(path, e))
}

fn write_error<E>(path: &Path, e: E) -> CaveError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    CaveError::io(path, std::io::Error::other(e))
}

/// Parses a catalog document. Any structural problem is a [`CaveError::Parse`].
pub fn read(source: &Path) -> Result<CatalogDocument> {
    let file = File::open(source).map_err(|e| CaveError::io(source, e))?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut document: Option<CatalogDocument> = None;
    let mut current: Option<ArtifactRecord> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CaveError::parse(source, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    REPOSITORY_TAG => {
                        let attrs = attributes(source, e)?;
                        let increment = match attrs.get("increment") {
                            Some(raw) => raw.parse::<u64>().map_err(|err| {
                                let detail = format!("invalid increment '{raw}': {err}");
                                CaveError::parse(source, detail)
                            })?,
                            None => 0,
                        };
                        document = Some(CatalogDocument {
                            name: attrs.get("name").cloned().unwrap_or_default(),
                            increment,
                            resources: Vec::new(),
                        });
                    }
                    RESOURCE_TAG => {
                        let mut attrs = attributes(source, e)?;
                        let mut required = |key: &str| {
                            attrs.remove(key).ok_or_else(|| {
                                CaveError::parse(source, format!("resource without '{key}'"))
                            })
                        };
                        let record = ArtifactRecord::new(
                            required("symbolicname")?,
                            required("version")?,
                            required("uri")?,
                        );
                        if empty {
                            push_resource(source, &mut document, record)?;
                        } else {
                            current = Some(record);
                        }
                    }
                    PROPERTY_TAG => {
                        let mut attrs = attributes(source, e)?;
                        let (Some(record), Some(key)) = (current.as_mut(), attrs.remove("n")) else {
                            return Err(CaveError::parse(source, "property outside of a resource"));
                        };
                        record
                            .attributes
                            .insert(key, attrs.remove("v").unwrap_or_default());
                    }
                    _ => {}
                }
            }
            Event::End(ref e) if e.name().as_ref() == RESOURCE_TAG => {
                if let Some(record) = current.take() {
                    push_resource(source, &mut document, record)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(CaveError::parse(source, "unterminated resource element"));
    }
    document.ok_or_else(|| CaveError::parse(source, "missing <repository> element"))
}

fn push_resource(
    source: &Path,
    document: &mut Option<CatalogDocument>,
    record: ArtifactRecord,
) -> Result<()> {
    match document.as_mut() {
        Some(doc) => {
            doc.resources.push(record);
            Ok(())
        }
        None => Err(CaveError::parse(source, "resource outside of <repository>")),
    }
}

fn attributes(
    source: &Path,
    elem: &BytesStart<'_>,
) -> Result<std::collections::HashMap<String, String>> {
    let mut out = std::collections::HashMap::new();
    for attr in elem.attributes() {
        let attr = attr.map_err(|e| CaveError::parse(source, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| CaveError::parse(source, e))?
            .to_string();
        out.insert(key, value);
    }
    Ok(out)
}

fn tmp_path(destination: &Path) -> PathBuf {
    let mut os = destination.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
