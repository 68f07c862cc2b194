//! ABOUTME: XML serializer walking the field tables in canonical schema order
//! ABOUTME: Leaf and composite text rendering is shared with the JSON projection

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::composite;
use crate::model::{Alert, Version};
use crate::reflect::{Entity, EntityRef, FieldValue};
use crate::{CapError, Result};

/// Text form of a leaf or of a text-encoded composite
///
/// Returns `None` for entities that are written as nested elements.
pub(crate) fn wire_text(value: &FieldValue<'_>, version: Version) -> Option<String> {
    let text = match *value {
        FieldValue::Str(text) => text.to_string(),
        FieldValue::Int(number) => number.to_string(),
        FieldValue::Float(number) => number.to_string(),
        FieldValue::Bool(flag) => flag.to_string(),
        FieldValue::Enum(table, index) => table.wire_value(index)?,
        FieldValue::Entity(entity) => match entity {
            EntityRef::Point(point) => composite::format_point(point),
            EntityRef::Circle(circle) => composite::format_circle(circle),
            EntityRef::Polygon(polygon) => composite::format_polygon(polygon),
            EntityRef::Group(group) => composite::format_group(group),
            EntityRef::ValuePair(pair) if version == Version::V1_0 => {
                composite::format_value_pair_10(pair)
            }
            _ => return None,
        },
    };
    Some(text)
}

/// Groups without values have no text form the parser would accept back
pub(crate) fn is_empty_group(value: &FieldValue<'_>) -> bool {
    matches!(value, FieldValue::Entity(EntityRef::Group(group)) if group.value.is_empty())
}

fn xml_error(e: impl std::fmt::Display) -> CapError {
    CapError::Serialization(e.to_string())
}

/// Writes alerts as CAP XML
#[derive(Debug, Clone, Default)]
pub struct CapXmlBuilder {
    indent: Option<usize>,
}

impl CapXmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-print with `indent` spaces per level; `0` writes a single line
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    pub fn indent(&self) -> Option<usize> {
        self.indent
    }

    pub fn to_xml(&self, alert: &Alert) -> Result<String> {
        let bytes = self.to_bytes(alert)?;
        String::from_utf8(bytes).map_err(xml_error)
    }

    pub fn to_bytes(&self, alert: &Alert) -> Result<Vec<u8>> {
        let mut writer = match self.indent {
            Some(indent) if indent > 0 => {
                Writer::new_with_indent(Cursor::new(Vec::new()), b' ', indent)
            }
            _ => Writer::new(Cursor::new(Vec::new())),
        };

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let mut root = BytesStart::new("alert");
        root.push_attribute(("xmlns", alert.version.xmlns()));
        writer.write_event(Event::Start(root)).map_err(xml_error)?;
        write_children(&mut writer, alert.entity_ref(), alert.version)?;
        writer
            .write_event(Event::End(BytesEnd::new("alert")))
            .map_err(xml_error)?;

        let bytes = writer.into_inner().into_inner();
        debug!(
            version = %alert.version,
            bytes = bytes.len(),
            indent = ?self.indent,
            "Serialized CAP alert to XML"
        );
        Ok(bytes)
    }
}

fn write_children(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    entity: EntityRef<'_>,
    version: Version,
) -> Result<()> {
    for field in entity.kind().fields() {
        for value in entity.values(field) {
            if is_empty_group(&value) {
                continue;
            }
            match (wire_text(&value, version), value) {
                (Some(text), _) => {
                    writer
                        .create_element(field.name)
                        .write_text_content(BytesText::new(&text))
                        .map_err(xml_error)?;
                }
                (None, FieldValue::Entity(child)) => {
                    writer
                        .write_event(Event::Start(BytesStart::new(field.name)))
                        .map_err(xml_error)?;
                    write_children(writer, child, version)?;
                    writer
                        .write_event(Event::End(BytesEnd::new(field.name)))
                        .map_err(xml_error)?;
                }
                (None, _) => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Area, Category, Certainty, Group, Info, Polygon, Point, Severity, Urgency, ValuePair};

    fn sample(version: Version) -> Alert {
        let mut alert = Alert::new(version);
        alert.identifier = Some("id-1".into());
        alert.sender = Some("sender@example.org".into());
        alert.sent = Some("2024-03-01T10:00:00-05:00".into());
        alert.addresses = Some(Group::new(["a b", "c"]));
        let mut info = Info::default();
        info.category.push(Category::Cbrne);
        info.event = Some("Spill".into());
        info.urgency = Some(Urgency::Unknown);
        info.severity = Some(Severity::Minor);
        info.certainty = Some(Certainty::Likely);
        info.parameter.push(ValuePair::new("key", "val"));
        let mut area = Area::default();
        area.area_desc = Some("Harbor".into());
        area.polygon.push(Polygon {
            point: vec![
                Point::new(1.0, 2.0),
                Point::new(3.0, 4.0),
                Point::new(5.5, 6.0),
                Point::new(1.0, 2.0),
            ],
        });
        info.area.push(area);
        alert.info.push(info);
        alert
    }

    #[test]
    fn test_single_line_output() {
        let xml = CapXmlBuilder::new().to_xml(&sample(Version::V1_2)).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<alert xmlns=\"urn:oasis:names:tc:emergency:cap:1.2\">"));
        assert!(!xml.contains('\n'));
        assert!(xml.contains("<addresses>&quot;a b&quot; c</addresses>"));
        assert!(xml.contains("<category>CBRNE</category>"));
        assert!(xml.contains("<urgency>Unknown</urgency>"));
        assert!(xml.contains("<polygon>1,2 3,4 5.5,6 1,2</polygon>"));
        assert!(xml.contains("<parameter><valueName>key</valueName><value>val</value></parameter>"));
    }

    #[test]
    fn test_indented_output() {
        let xml = CapXmlBuilder::new()
            .with_indent(4)
            .to_xml(&sample(Version::V1_2))
            .unwrap();
        assert!(xml.contains("\n    <identifier>id-1</identifier>"));
        assert!(xml.contains("\n        <event>Spill</event>"));
    }

    #[test]
    fn test_fields_follow_canonical_order() {
        let xml = CapXmlBuilder::new().to_xml(&sample(Version::V1_2)).unwrap();
        let identifier = xml.find("<identifier>").unwrap();
        let sent = xml.find("<sent>").unwrap();
        let addresses = xml.find("<addresses>").unwrap();
        let info = xml.find("<info>").unwrap();
        assert!(identifier < sent && sent < addresses && addresses < info);
    }

    #[test]
    fn test_cap10_value_pairs_are_text() {
        let xml = CapXmlBuilder::new().to_xml(&sample(Version::V1_0)).unwrap();
        assert!(xml.contains("<parameter>key=val</parameter>"));
        assert!(xml.contains("http://www.incident.com/cap/1.0"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut alert = Alert::new(Version::V1_2);
        alert.note = Some("a < b & c".into());
        let xml = CapXmlBuilder::new().to_xml(&alert).unwrap();
        assert!(xml.contains("<note>a &lt; b &amp; c</note>"));
    }

    #[test]
    fn test_empty_group_is_omitted() {
        let mut alert = Alert::new(Version::V1_2);
        alert.incidents = Some(Group::default());
        let xml = CapXmlBuilder::new().to_xml(&alert).unwrap();
        assert!(!xml.contains("incidents"));
    }
}
