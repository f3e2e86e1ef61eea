//! `imsmanifest.xml` parsing
//!
//! Element names are matched on their local part so that packages with and
//! without a default namespace parse the same way.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::cmi::ProtocolVersion;
use crate::error::{Error, Result};

/// Launch page used when the manifest names none
pub const DEFAULT_ENTRY: &str = "index.html";

/// What the runtime needs to know about a package
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestInfo {
    pub version: ProtocolVersion,
    /// Launch page relative to the package root
    pub entry_path: String,
    /// `adlcp:datafromlms` of the launched item
    pub launch_data: Option<String>,
}

#[derive(Debug)]
struct Resource {
    identifier: Option<String>,
    href: Option<String>,
}

/// Parse manifest XML into version, entry page, and launch data
///
/// - version is SCORM 1.2 when `metadata/schemaversion` is absent or exactly
///   `1.2`, SCORM 2004 otherwise
/// - the launched item is the first organization item with an
///   `identifierref`; its resource's `href` is the entry page. With a single
///   resource that resource is used directly.
pub fn parse_manifest(xml: &str) -> Result<ManifestInfo> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut schema_version: Option<String> = None;
    let mut item_ref: Option<String> = None;
    let mut launch_item_depth: Option<usize> = None;
    let mut launch_data: Option<String> = None;
    let mut resources: Vec<Resource> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| invalid(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = local_name(e);
                let in_organizations = path.iter().any(|p| p == "organizations");
                let in_resources = path.last().map(String::as_str) == Some("resources");

                if name == "item" && in_organizations && item_ref.is_none() {
                    if let Some(id_ref) = attr(e, "identifierref")? {
                        item_ref = Some(id_ref);
                        if matches!(event, Event::Start(_)) {
                            launch_item_depth = Some(path.len());
                        }
                    }
                } else if name == "resource" && in_resources {
                    resources.push(Resource {
                        identifier: attr(e, "identifier")?,
                        href: attr(e, "href")?,
                    });
                }

                if matches!(event, Event::Start(_)) {
                    path.push(name);
                }
            }
            Event::End(_) => {
                path.pop();
                if launch_item_depth == Some(path.len()) {
                    launch_item_depth = None;
                }
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| invalid(e.to_string()))?
                    .trim()
                    .to_string();
                capture_text(&path, launch_item_depth, text, &mut schema_version, &mut launch_data);
            }
            Event::CData(ref c) => {
                let text = String::from_utf8_lossy(c).trim().to_string();
                capture_text(&path, launch_item_depth, text, &mut schema_version, &mut launch_data);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let version = match schema_version.as_deref() {
        None | Some("1.2") => ProtocolVersion::Scorm12,
        Some(_) => ProtocolVersion::Scorm2004,
    };

    let entry = if resources.len() == 1 {
        resources[0].href.clone()
    } else {
        item_ref
            .as_deref()
            .and_then(|id_ref| {
                resources
                    .iter()
                    .find(|r| r.identifier.as_deref() == Some(id_ref))
            })
            .or_else(|| resources.iter().find(|r| r.href.is_some()))
            .and_then(|r| r.href.clone())
    };

    Ok(ManifestInfo {
        version,
        entry_path: entry.unwrap_or_else(|| DEFAULT_ENTRY.to_string()),
        launch_data: launch_data.filter(|d| !d.is_empty()),
    })
}

fn capture_text(
    path: &[String],
    launch_item_depth: Option<usize>,
    text: String,
    schema_version: &mut Option<String>,
    launch_data: &mut Option<String>,
) {
    let tail: Vec<&str> = path.iter().map(String::as_str).collect();
    // Only the package-level metadata counts, not per-resource metadata
    if tail == ["manifest", "metadata", "schemaversion"] {
        *schema_version = Some(text);
    } else if let Some(depth) = launch_item_depth {
        if path.len() == depth + 2 && tail.last() == Some(&"datafromlms") {
            *launch_data = Some(text);
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, wanted: &str) -> Result<Option<String>> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| invalid(err.to_string()))?;
        if attribute.key.local_name().as_ref() == wanted.as_bytes() {
            let value = attribute
                .unescape_value()
                .map_err(|err| invalid(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn invalid(detail: String) -> Error {
    Error::PackageUpload(format!("Invalid imsmanifest.xml: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORM12_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="course" version="1.0"
    xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2"
    xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2">
  <metadata>
    <schema>ADL SCORM</schema>
    <schemaversion>1.2</schemaversion>
  </metadata>
  <organizations default="org1">
    <organization identifier="org1">
      <title>Course</title>
      <item identifier="item1" identifierref="res1">
        <title>Lesson</title>
        <adlcp:datafromlms>level=3</adlcp:datafromlms>
      </item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="res1" type="webcontent" adlcp:scormtype="sco" href="content/start.html">
      <file href="content/start.html"/>
    </resource>
  </resources>
</manifest>"#;

    const SCORM2004_MANIFEST: &str = r#"<?xml version="1.0"?>
<manifest identifier="m" xmlns="http://www.imsglobal.org/xsd/imscp_v1p1">
  <metadata>
    <schema>ADL SCORM</schema>
    <schemaversion>2004 4th Edition</schemaversion>
  </metadata>
  <organizations default="o">
    <organization identifier="o">
      <item identifier="i" identifierref="sco2"/>
    </organization>
  </organizations>
  <resources>
    <resource identifier="shared" type="webcontent" href="shared/lib.js"/>
    <resource identifier="sco2" type="webcontent" href="player.html"/>
  </resources>
</manifest>"#;

    #[test]
    fn test_scorm12_manifest() {
        let info = parse_manifest(SCORM12_MANIFEST).unwrap();
        assert_eq!(info.version, ProtocolVersion::Scorm12);
        assert_eq!(info.entry_path, "content/start.html");
        assert_eq!(info.launch_data.as_deref(), Some("level=3"));
    }

    #[test]
    fn test_scorm2004_manifest_selects_referenced_resource() {
        let info = parse_manifest(SCORM2004_MANIFEST).unwrap();
        assert_eq!(info.version, ProtocolVersion::Scorm2004);
        assert_eq!(info.entry_path, "player.html");
        assert_eq!(info.launch_data, None);
    }

    #[test]
    fn test_manifest_without_namespace() {
        let xml = r#"<manifest><resources><resource identifier="r" href="a.html"/></resources></manifest>"#;
        let info = parse_manifest(xml).unwrap();
        assert_eq!(info.version, ProtocolVersion::Scorm12);
        assert_eq!(info.entry_path, "a.html");
    }

    #[test]
    fn test_manifest_without_resources_uses_index() {
        let info = parse_manifest("<manifest><metadata/></manifest>").unwrap();
        assert_eq!(info.entry_path, DEFAULT_ENTRY);
    }

    #[test]
    fn test_resource_metadata_does_not_set_version() {
        let xml = r#"<manifest>
  <resources>
    <resource identifier="r" href="a.html">
      <metadata><schemaversion>CAM 1.3</schemaversion></metadata>
    </resource>
  </resources>
</manifest>"#;
        assert_eq!(parse_manifest(xml).unwrap().version, ProtocolVersion::Scorm12);
    }

    #[test]
    fn test_malformed_xml_is_upload_failure() {
        let result = parse_manifest("<manifest><resources></manifest>");
        assert!(matches!(result, Err(Error::PackageUpload(_))));
    }
}
