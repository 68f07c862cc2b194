//! ABOUTME: Schema-grammar checks for CAP documents behind a pluggable trait
//! ABOUTME: Built-in ElementSchema derives element order, cardinality and enum values from field tables

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::descriptor::{required_fields, EntityKind, FieldDescriptor, FieldKind};
use crate::input::CachedInput;
use crate::model::Version;
use crate::parser::SIGNATURE_ELEMENT;
use crate::reasons::{ReasonType, Reasons};
use crate::xpath::XPath;
use crate::{CapError, Result};

/// Grammar check of a raw document for a detected CAP version
///
/// `strict` selects the schema exactly as published; otherwise the extended schema,
/// which also forbids some patterns the published one lets through.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &[u8], version: Version, strict: bool) -> Result<Reasons>;
}

/// Leaves whose text must be a non-blank token under the extended schema
const REQUIRED_TOKENS: &[&str] = &[
    "identifier",
    "sender",
    "sent",
    "event",
    "areaDesc",
    "resourceDesc",
    "valueName",
];

/// Schema check driven by the model's field tables
///
/// Reports unknown elements, out-of-order elements, enumeration values that are
/// not legal for the version and, with the published schema, missing required
/// elements. In extended mode presence is left to the semantic validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementSchema;

/// Wire values an enumeration accepts in a given version
fn allowed_enum_values(field: &FieldDescriptor, version: Version) -> Vec<String> {
    let FieldKind::Enum(table) = field.kind else {
        return Vec::new();
    };
    table
        .wire_values()
        .into_iter()
        .filter(|value| match value.as_str() {
            "Avoid" | "AllClear" => version >= Version::V1_2,
            "Very Likely" => version == Version::V1_0,
            _ => true,
        })
        .collect()
}

enum Frame {
    Entity {
        kind: EntityKind,
        last_index: Option<usize>,
        seen: HashSet<&'static str>,
    },
    Leaf(&'static FieldDescriptor),
    Skip,
}

struct SchemaWalk {
    version: Version,
    strict: bool,
    xpath: XPath,
    stack: Vec<Frame>,
    text: String,
    reasons: Reasons,
}

impl SchemaWalk {
    fn start(&mut self, name: &str, in_cap_namespace: bool) {
        self.xpath.push(name);
        self.text.clear();

        let frame = match self.stack.last_mut() {
            None => Frame::Entity {
                kind: EntityKind::Alert,
                last_index: None,
                seen: HashSet::new(),
            },
            Some(Frame::Entity {
                kind,
                last_index,
                seen,
            }) => {
                if name == SIGNATURE_ELEMENT && *kind == EntityKind::Alert {
                    Frame::Skip
                } else {
                    let found = if in_cap_namespace { kind.field(name) } else { None };
                    match found {
                        Some((index, field)) if field.name == name => {
                            if let Some(last) = *last_index {
                                if index < last {
                                    let expected = kind.fields()[last].name;
                                    self.reasons.push(
                                        self.xpath.path(),
                                        &ReasonType::InvalidSequence,
                                        [name, expected],
                                    );
                                }
                            }
                            *last_index = Some(last_index.map_or(index, |last| last.max(index)));
                            seen.insert(field.name);
                            let version = self.version;
                            child_frame(field, version)
                        }
                        _ => {
                            self.reasons.push(
                                self.xpath.path(),
                                &ReasonType::UnsupportedElement,
                                [name],
                            );
                            Frame::Skip
                        }
                    }
                }
            }
            Some(Frame::Leaf(_)) => {
                self.reasons
                    .push(self.xpath.path(), &ReasonType::UnsupportedElement, [name]);
                Frame::Skip
            }
            Some(Frame::Skip) => Frame::Skip,
        };
        self.stack.push(frame);
    }

    fn text(&mut self, text: &str) {
        if matches!(self.stack.last(), Some(Frame::Leaf(_))) {
            self.text.push_str(text);
        }
    }

    fn end(&mut self) {
        let text = std::mem::take(&mut self.text);
        match self.stack.pop() {
            Some(Frame::Leaf(field)) => self.check_leaf(field, &text),
            Some(Frame::Entity { kind, seen, .. }) if self.strict => {
                for required in required_fields(kind, self.version) {
                    if !seen.contains(required) {
                        self.reasons.push(
                            self.xpath.path(),
                            &ReasonType::MissingRequiredElement,
                            [required],
                        );
                    }
                }
            }
            _ => {}
        }
        self.xpath.pop();
    }

    fn check_leaf(&mut self, field: &'static FieldDescriptor, text: &str) {
        if matches!(field.kind, FieldKind::Enum(_)) {
            let allowed = allowed_enum_values(field, self.version);
            if !allowed.iter().any(|value| value == text) {
                self.reasons.push(
                    self.xpath.path(),
                    &ReasonType::InvalidEnumValue,
                    [
                        field.name.to_string(),
                        text.to_string(),
                        format!("[{}]", allowed.join(", ")),
                    ],
                );
            }
        }
        if !self.strict && REQUIRED_TOKENS.contains(&field.name) && text.trim().is_empty() {
            self.reasons
                .push(self.xpath.path(), &ReasonType::EmptyElement, [field.name]);
        }
    }
}

fn child_frame(field: &'static FieldDescriptor, version: Version) -> Frame {
    match field.kind {
        FieldKind::Entity(kind) if !kind.is_text_encoded(version) => {
            Frame::Entity {
                kind,
                last_index: None,
                seen: HashSet::new(),
            }
        }
        _ => Frame::Leaf(field),
    }
}

impl SchemaValidator for ElementSchema {
    fn validate(&self, document: &[u8], version: Version, strict: bool) -> Result<Reasons> {
        let xmlns = version.xmlns().as_bytes();
        let mut reader = NsReader::from_reader(document);
        reader.config_mut().expand_empty_elements = true;

        let mut walk = SchemaWalk {
            version,
            strict,
            xpath: XPath::new(),
            stack: Vec::new(),
            text: String::new(),
            reasons: Reasons::new(),
        };
        let mut buf = Vec::new();
        loop {
            let (in_cap_namespace, event) = match reader.read_resolved_event_into(&mut buf) {
                Ok((ns, event)) => (
                    matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == xmlns),
                    event,
                ),
                Err(e) => return Err(schema_syntax_error(document, &reader, e.to_string())),
            };
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    walk.start(&name, in_cap_namespace);
                }
                Event::End(_) => walk.end(),
                Event::Text(t) => match t.unescape() {
                    Ok(text) => walk.text(&text),
                    Err(e) => return Err(schema_syntax_error(document, &reader, e.to_string())),
                },
                Event::CData(c) => walk.text(&String::from_utf8_lossy(&c.into_inner())),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(walk.reasons)
    }
}

fn schema_syntax_error(document: &[u8], reader: &NsReader<&[u8]>, message: String) -> CapError {
    let (line, column) =
        CachedInput::from_bytes(document).line_column(reader.buffer_position() as usize);
    CapError::Syntax {
        line,
        column,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::{alert_with_info, fixture, wrap_alert};

    fn check(xml: &str, strict: bool) -> Reasons {
        let version = if xml.contains(Version::CAP10_XMLNS) {
            Version::V1_0
        } else if xml.contains(Version::CAP11_XMLNS) {
            Version::V1_1
        } else {
            Version::V1_2
        };
        ElementSchema
            .validate(xml.as_bytes(), version, strict)
            .unwrap()
    }

    #[test]
    fn test_fixtures_conform() {
        for name in ["cap12_minimal.xml", "cap12_full.xml", "cap11_draft.xml", "cap10_legacy.xml", "signed_alert.xml"] {
            let reasons = check(fixture(name), true);
            assert!(reasons.is_empty(), "{name}: {reasons}");
        }
    }

    #[test]
    fn test_out_of_order_element() {
        let xml = alert_with_info(
            "<event>e</event><category>Met</category>\
             <urgency>Past</urgency><severity>Minor</severity><certainty>Likely</certainty>",
        );
        let reasons = check(&xml, true);
        let reason = reasons.iter().find(|r| r.code() == "INVALID_SEQUENCE").unwrap();
        assert_eq!(reason.xpath(), "/alert[1]/info[1]/category[1]");
        assert_eq!(reason.params(), &["category".to_string(), "event".to_string()]);
    }

    #[test]
    fn test_enum_values_are_version_gated() {
        let body = "<category>Met</category><event>e</event><responseType>AllClear</responseType>\
                    <urgency>Past</urgency><severity>Minor</severity><certainty>Likely</certainty>";
        assert!(check(&alert_with_info(body), true).is_empty());

        let cap11 = wrap_alert(Version::CAP11_XMLNS, &format!("<info>{body}</info>"));
        let reasons = check(&cap11, true);
        assert!(reasons.contains_code("INVALID_ENUM_VALUE"));

        let very_likely = alert_with_info(
            "<category>Met</category><event>e</event>\
             <urgency>Past</urgency><severity>Minor</severity><certainty>Very Likely</certainty>",
        );
        assert!(check(&very_likely, true).contains_code("INVALID_ENUM_VALUE"));
    }

    #[test]
    fn test_enum_values_are_case_sensitive() {
        let xml = wrap_alert(Version::CAP12_XMLNS, "").replace("<status>Test</status>", "<status>test</status>");
        let reasons = check(&xml, true);
        let reason = reasons.iter().find(|r| r.code() == "INVALID_ENUM_VALUE").unwrap();
        assert_eq!(reason.xpath(), "/alert[1]/status[1]");
        assert!(reason.message().contains("Actual, Exercise, System, Test, Draft"));
    }

    #[test]
    fn test_missing_required_only_in_strict_mode() {
        let xml = alert_with_info("<event>e</event>");
        let strict = check(&xml, true);
        let missing: Vec<&str> = strict
            .iter()
            .filter(|r| r.code() == "MISSING_REQUIRED_ELEMENT")
            .map(|r| r.params()[0].as_str())
            .collect();
        assert_eq!(missing, vec!["category", "urgency", "severity", "certainty"]);
        assert!(!check(&xml, false).contains_code("MISSING_REQUIRED_ELEMENT"));
    }

    #[test]
    fn test_blank_token_only_in_extended_mode() {
        let xml = wrap_alert(Version::CAP12_XMLNS, "").replace(
            "<identifier>test-1</identifier>",
            "<identifier>   </identifier>",
        );
        assert!(check(&xml, false).contains_code("EMPTY_ELEMENT"));
        assert!(!check(&xml, true).contains_code("EMPTY_ELEMENT"));
    }

    #[test]
    fn test_children_of_leaves_are_unsupported() {
        let xml = wrap_alert(Version::CAP12_XMLNS, "<note>a <b>bold</b> note</note>");
        let reasons = check(&xml, true);
        let reason = reasons.iter().find(|r| r.code() == "UNSUPPORTED_ELEMENT").unwrap();
        assert_eq!(reason.xpath(), "/alert[1]/note[1]/b[1]");
    }

    #[test]
    fn test_foreign_namespace_is_unsupported() {
        let xml = wrap_alert(
            Version::CAP12_XMLNS,
            "<x:note xmlns:x=\"urn:example\">foreign</x:note>",
        );
        assert!(check(&xml, true).contains_code("UNSUPPORTED_ELEMENT"));
    }
}
