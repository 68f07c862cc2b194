//! ABOUTME: JSON projection of an alert mirroring the XML element tree
//! ABOUTME: Repeatable fields are always arrays; composite types stay in their text form

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::descriptor::repeated_field_names;
use crate::model::{Alert, Version};
use crate::reflect::{Entity, EntityRef, FieldValue};
use crate::ser::{is_empty_group, wire_text};
use crate::{CapError, Result};

/// Writes alerts as JSON objects keyed by CAP element name
#[derive(Debug, Clone, Default)]
pub struct CapJsonBuilder {
    indent: Option<usize>,
}

impl CapJsonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-print with `indent` spaces per level; `0` writes compact JSON
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    pub fn indent(&self) -> Option<usize> {
        self.indent
    }

    /// The alert's children as a JSON object, without an `alert` wrapper
    pub fn to_value(&self, alert: &Alert) -> JsonValue {
        JsonValue::Object(entity_object(alert.entity_ref(), alert.version))
    }

    pub fn to_json(&self, alert: &Alert) -> Result<String> {
        let value = self.to_value(alert);
        let json = match self.indent {
            Some(indent) if indent > 0 => {
                let indent = vec![b' '; indent];
                let mut out = Vec::new();
                let mut serializer = serde_json::Serializer::with_formatter(
                    &mut out,
                    PrettyFormatter::with_indent(&indent),
                );
                value
                    .serialize(&mut serializer)
                    .map_err(|e| CapError::Serialization(e.to_string()))?;
                String::from_utf8(out).map_err(|e| CapError::Serialization(e.to_string()))?
            }
            _ => serde_json::to_string(&value)
                .map_err(|e| CapError::Serialization(e.to_string()))?,
        };
        debug!(
            version = %alert.version,
            bytes = json.len(),
            indent = ?self.indent,
            "Serialized CAP alert to JSON"
        );
        Ok(json)
    }
}

fn entity_object(entity: EntityRef<'_>, version: Version) -> Map<String, JsonValue> {
    let kind = entity.kind();
    let repeated = repeated_field_names(kind);
    let mut object = Map::new();
    for field in kind.fields() {
        let values: Vec<JsonValue> = entity
            .values(field)
            .iter()
            .filter(|value| !is_empty_group(value))
            .filter_map(|value| json_value(value, version))
            .collect();
        if values.is_empty() {
            continue;
        }
        let value = if repeated.contains(field.name) {
            JsonValue::Array(values)
        } else {
            values.into_iter().next().unwrap_or(JsonValue::Null)
        };
        object.insert(field.name.to_string(), value);
    }
    object
}

fn json_value(value: &FieldValue<'_>, version: Version) -> Option<JsonValue> {
    match (wire_text(value, version), value) {
        (Some(text), _) => Some(JsonValue::String(text)),
        (None, FieldValue::Entity(child)) => Some(JsonValue::Object(entity_object(*child, version))),
        (None, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Area, Circle, Group, Info, Point, Status, ValuePair};
    use serde_json::json;

    fn sample() -> Alert {
        let mut alert = Alert::new(Version::V1_2);
        alert.identifier = Some("id-1".into());
        alert.status = Some(Status::Actual);
        alert.code.push("IPAWSv1.0".into());
        alert.references = Some(Group::new(["s,id-0,2024-03-01T10:00:00-05:00"]));
        let mut info = Info::default();
        info.event = Some("Flood".into());
        info.event_code.push(ValuePair::new("SAME", "FLW"));
        let mut area = Area::default();
        area.area_desc = Some("Valley".into());
        area.circle.push(Circle {
            point: Point::new(32.9, -115.5),
            radius: 10.0,
        });
        info.area.push(area);
        alert.info.push(info);
        alert
    }

    #[test]
    fn test_object_shape() {
        let value = CapJsonBuilder::new().to_value(&sample());
        assert_eq!(
            value,
            json!({
                "identifier": "id-1",
                "status": "Actual",
                "code": ["IPAWSv1.0"],
                "references": "s,id-0,2024-03-01T10:00:00-05:00",
                "info": [{
                    "event": "Flood",
                    "eventCode": [{"valueName": "SAME", "value": "FLW"}],
                    "area": [{
                        "areaDesc": "Valley",
                        "circle": ["32.9,-115.5 10"]
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_singular_value_pair_value_is_scalar() {
        let value = CapJsonBuilder::new().to_value(&sample());
        assert!(value["info"][0]["eventCode"][0]["value"].is_string());
    }

    #[test]
    fn test_compact_and_indented_output() {
        let compact = CapJsonBuilder::new().to_json(&sample()).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.starts_with("{\"identifier\":\"id-1\""));

        let pretty = CapJsonBuilder::new().with_indent(3).to_json(&sample()).unwrap();
        assert!(pretty.contains("\n   \"identifier\": \"id-1\""));
        let reparsed: JsonValue = serde_json::from_str(&pretty).unwrap();
        assert_eq!(reparsed, CapJsonBuilder::new().to_value(&sample()));
    }
}
