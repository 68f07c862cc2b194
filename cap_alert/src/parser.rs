//! ABOUTME: Streaming CAP XML parser building typed alerts from quick-xml events
//! ABOUTME: Collects parse-time findings as Reasons and runs the schema and semantic passes

use std::io::Read;

use cap_core::MonotonicTimer;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracing::{debug, info};

use crate::composite;
use crate::descriptor::{EntityKind, FieldDescriptor, FieldKind};
use crate::input::CachedInput;
use crate::model::{Alert, Area, Info, Resource, ValuePair, Version};
use crate::reasons::{Level, ReasonType, Reasons};
use crate::reflect::{Assigned, Entity, EntityValue, Value};
use crate::schema::{ElementSchema, SchemaValidator};
use crate::validator::CapValidator;
use crate::xpath::XPath;
use crate::{CapError, Result};

/// Local name of the XML digital signature element allowed inside `<alert>`
pub(crate) const SIGNATURE_ELEMENT: &str = "Signature";

/// CAP XML parser
///
/// With `strict_schema` the document is checked against the published schema only;
/// otherwise the extended schema checks run and the semantic [`CapValidator`] is
/// layered on top. With `validate`, the non-`_with_reasons` entry points fail with
/// [`CapError::Invalid`] when any ERROR finding was recorded.
pub struct CapXmlParser {
    validate: bool,
    strict_schema: bool,
    schema: Box<dyn SchemaValidator>,
}

impl Default for CapXmlParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CapXmlParser {
    pub fn new(validate: bool) -> Self {
        Self {
            validate,
            strict_schema: false,
            schema: Box::new(ElementSchema),
        }
    }

    pub fn with_strict_schema(mut self, strict_schema: bool) -> Self {
        self.strict_schema = strict_schema;
        self
    }

    /// Replace the built-in schema check
    pub fn with_schema(mut self, schema: Box<dyn SchemaValidator>) -> Self {
        self.schema = schema;
        self
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn strict_schema(&self) -> bool {
        self.strict_schema
    }

    /// Parse a document, failing on ERROR findings when validating
    pub fn parse_str(&self, xml: &str) -> Result<Alert> {
        self.parse_from(xml.as_bytes())
    }

    pub fn parse_from<R: Read>(&self, source: R) -> Result<Alert> {
        let mut reasons = Reasons::new();
        let alert = self.parse_from_with_reasons(source, &mut reasons)?;
        if self.validate {
            reasons.into_result(Level::Error)?;
        }
        Ok(alert)
    }

    /// Parse a document, recording every finding in `reasons` instead of failing on them
    pub fn parse_str_with_reasons(&self, xml: &str, reasons: &mut Reasons) -> Result<Alert> {
        self.parse_from_with_reasons(xml.as_bytes(), reasons)
    }

    pub fn parse_from_with_reasons<R: Read>(
        &self,
        source: R,
        reasons: &mut Reasons,
    ) -> Result<Alert> {
        let mut input = CachedInput::from_reader(source)?;
        self.parse_input(&mut input, reasons)
    }

    /// Run every pass over an already buffered document
    pub fn parse_input(&self, input: &mut CachedInput, reasons: &mut Reasons) -> Result<Alert> {
        let timer = MonotonicTimer::new();

        let version = detect_version(input)?;
        input.reset();
        let schema_reasons = self
            .schema
            .validate(input.as_bytes(), version, self.strict_schema)?;
        reasons.extend(schema_reasons);

        input.reset();
        let (alert, parse_reasons) = parse_alert(input, version)?;
        reasons.extend(parse_reasons);

        if !self.strict_schema {
            reasons.extend(CapValidator::new().validate(&alert));
        }

        info!(
            version = %version,
            identifier = alert.identifier.as_deref().unwrap_or(""),
            errors = reasons.get_with_level(Level::Error).len(),
            warnings = reasons.get_with_level(Level::Warning).len(),
            elapsed_us = timer.elapsed_micros(),
            "Parsed CAP alert"
        );
        Ok(alert)
    }
}

/// Sniff the root element: it must be `alert` in one of the CAP namespaces
pub fn detect_version(input: &mut CachedInput) -> Result<Version> {
    input.reset();
    let mut reader = NsReader::from_reader(&mut *input);
    let mut buf = Vec::new();
    loop {
        let (namespace, root) = match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => (
                resolved_namespace(&ns),
                String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            ),
            Ok((_, Event::Eof)) => {
                return Err(CapError::NotCap("document has no root element".to_string()))
            }
            Ok(_) => {
                buf.clear();
                continue;
            }
            Err(e) => {
                let position = reader.buffer_position() as usize;
                return Err(syntax_error(reader.get_ref(), position, e.to_string()));
            }
        };

        let version = namespace.as_deref().and_then(Version::from_xmlns);
        debug!(root = %root, namespace = ?namespace, "Sniffed document root");
        return match version {
            Some(version) if root == "alert" => Ok(version),
            _ => Err(CapError::NotCap(format!(
                "root element <{}> in namespace {:?} is not a CAP alert",
                root,
                namespace.unwrap_or_default()
            ))),
        };
    }
}

fn resolved_namespace(ns: &ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

fn syntax_error(input: &CachedInput, position: usize, message: String) -> CapError {
    let (line, column) = input.line_column(position);
    CapError::Syntax {
        line,
        column,
        message,
    }
}

/// Streaming pass: map the element tree onto the model
fn parse_alert(input: &mut CachedInput, version: Version) -> Result<(Alert, Reasons)> {
    let xmlns = version.xmlns().as_bytes();
    let mut reader = NsReader::from_reader(&mut *input);
    reader.config_mut().expand_empty_elements = true;

    let mut handler = AlertHandler::new(version);
    let mut buf = Vec::new();
    loop {
        let (in_cap_namespace, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, event)) => (matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == xmlns), event),
            Err(e) => {
                let position = reader.buffer_position() as usize;
                return Err(syntax_error(reader.get_ref(), position, e.to_string()));
            }
        };

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                handler.start_element(&name, in_cap_namespace);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                handler.end_element(&name);
            }
            Event::Text(t) => match t.unescape() {
                Ok(text) => handler.characters(&text),
                Err(e) => {
                    let position = reader.buffer_position() as usize;
                    return Err(syntax_error(reader.get_ref(), position, e.to_string()));
                }
            },
            Event::CData(c) => handler.characters(&String::from_utf8_lossy(&c.into_inner())),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let position = reader.buffer_position() as usize;
    handler
        .finish()
        .ok_or_else(|| syntax_error(reader.get_ref(), position, "unexpected end of document".to_string()))
}

/// In-progress entity; finalized into its model value when its element closes
#[derive(Debug)]
enum Draft {
    Alert(Alert),
    Info(Info),
    Resource(Resource),
    Area(Area),
    ValuePair(ValuePair),
}

impl Draft {
    fn new(kind: EntityKind, version: Version) -> Option<Self> {
        match kind {
            EntityKind::Alert => Some(Draft::Alert(Alert::new(version))),
            EntityKind::Info => Some(Draft::Info(Info::default())),
            EntityKind::Resource => Some(Draft::Resource(Resource::default())),
            EntityKind::Area => Some(Draft::Area(Area::default())),
            EntityKind::ValuePair => Some(Draft::ValuePair(ValuePair::default())),
            _ => None,
        }
    }

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match self {
            Draft::Alert(e) => e.assign(field, value),
            Draft::Info(e) => e.assign(field, value),
            Draft::Resource(e) => e.assign(field, value),
            Draft::Area(e) => e.assign(field, value),
            Draft::ValuePair(e) => e.assign(field, value),
        }
    }

    fn into_value(self) -> Option<EntityValue> {
        match self {
            Draft::Alert(_) => None,
            Draft::Info(e) => Some(EntityValue::Info(e)),
            Draft::Resource(e) => Some(EntityValue::Resource(e)),
            Draft::Area(e) => Some(EntityValue::Area(e)),
            Draft::ValuePair(e) => Some(EntityValue::ValuePair(e)),
        }
    }
}

#[derive(Debug)]
enum Frame {
    /// Entity built from child elements
    Entity {
        kind: EntityKind,
        draft: Draft,
        field: Option<&'static FieldDescriptor>,
    },
    /// Leaf whose text is coerced by field kind
    Scalar { field: &'static FieldDescriptor },
    /// Entity encoded as delimited text
    Composite {
        kind: EntityKind,
        field: &'static FieldDescriptor,
    },
    /// Signature, foreign or unknown subtree
    Skip,
}

struct AlertHandler {
    version: Version,
    xpath: XPath,
    stack: Vec<Frame>,
    text: String,
    reasons: Reasons,
    alert: Option<Alert>,
}

impl AlertHandler {
    fn new(version: Version) -> Self {
        Self {
            version,
            xpath: XPath::new(),
            stack: Vec::new(),
            text: String::new(),
            reasons: Reasons::new(),
            alert: None,
        }
    }

    fn start_element(&mut self, name: &str, in_cap_namespace: bool) {
        self.xpath.push(name);
        self.text.clear();

        let frame = match self.stack.last() {
            None => match Draft::new(EntityKind::Alert, self.version) {
                Some(draft) => Frame::Entity {
                    kind: EntityKind::Alert,
                    draft,
                    field: None,
                },
                None => Frame::Skip,
            },
            Some(Frame::Entity { kind, .. }) if in_cap_namespace && name != SIGNATURE_ELEMENT => {
                self.child_frame(*kind, name)
            }
            Some(_) => Frame::Skip,
        };
        self.stack.push(frame);
    }

    fn child_frame(&self, parent: EntityKind, name: &str) -> Frame {
        let Some((_, field)) = parent.field(name) else {
            return Frame::Skip;
        };
        match field.kind {
            FieldKind::Entity(kind) if kind.is_text_encoded(self.version) => {
                Frame::Composite { kind, field }
            }
            FieldKind::Entity(kind) => match Draft::new(kind, self.version) {
                Some(draft) => Frame::Entity {
                    kind,
                    draft,
                    field: Some(field),
                },
                None => Frame::Skip,
            },
            _ => Frame::Scalar { field },
        }
    }

    fn characters(&mut self, text: &str) {
        if matches!(
            self.stack.last(),
            Some(Frame::Scalar { .. }) | Some(Frame::Composite { .. })
        ) {
            self.text.push_str(text);
        }
    }

    fn end_element(&mut self, name: &str) {
        let position = self.xpath.path();
        let text = std::mem::take(&mut self.text);

        match self.stack.pop() {
            Some(Frame::Scalar { field }) => {
                if let Some(value) = self.coerce_scalar(field, &text, &position) {
                    self.assign_to_parent(field, value, &text, &position);
                }
            }
            Some(Frame::Composite { kind, field }) => {
                if let Some(value) = self.parse_composite(kind, field, &text, &position) {
                    self.assign_to_parent(field, Value::Entity(value), &text, &position);
                }
            }
            Some(Frame::Entity {
                draft,
                field: Some(field),
                ..
            }) => {
                if let Some(value) = draft.into_value() {
                    self.assign_to_parent(field, Value::Entity(value), name, &position);
                }
            }
            Some(Frame::Entity {
                kind: EntityKind::Alert,
                draft: Draft::Alert(alert),
                field: None,
            }) => self.alert = Some(alert),
            Some(_) | None => {}
        }
        self.xpath.pop();
    }

    fn coerce_scalar(
        &mut self,
        field: &'static FieldDescriptor,
        text: &str,
        position: &str,
    ) -> Option<Value> {
        match coerce(field.kind, text) {
            Coerced::Value(value) => Some(value),
            Coerced::Unmatched => None,
            Coerced::Invalid => {
                self.reasons
                    .push(position, &ReasonType::InvalidValue, [field.name, text.trim()]);
                None
            }
        }
    }

    fn parse_composite(
        &mut self,
        kind: EntityKind,
        field: &'static FieldDescriptor,
        text: &str,
        position: &str,
    ) -> Option<EntityValue> {
        match kind {
            EntityKind::Group => composite::parse_group(text).map(EntityValue::Group),
            EntityKind::Circle => {
                let circle = composite::parse_circle(text).map(EntityValue::Circle);
                if circle.is_none() {
                    self.reasons.push(
                        position,
                        &ReasonType::InvalidCircle,
                        [composite::truncate_for_message(text.trim())],
                    );
                }
                circle
            }
            EntityKind::Polygon => {
                let polygon = composite::parse_polygon(text).map(EntityValue::Polygon);
                if polygon.is_none() {
                    self.reasons.push(
                        position,
                        &ReasonType::InvalidPolygon,
                        [composite::truncate_for_message(text.trim())],
                    );
                }
                polygon
            }
            EntityKind::Point => composite::parse_point(text).map(EntityValue::Point),
            EntityKind::ValuePair => {
                let pair = composite::parse_value_pair_10(text).map(EntityValue::ValuePair);
                if pair.is_none() {
                    self.reasons.push(
                        position,
                        &ReasonType::InvalidValue,
                        [field.name, text.trim()],
                    );
                }
                pair
            }
            _ => None,
        }
    }

    fn assign_to_parent(
        &mut self,
        field: &'static FieldDescriptor,
        value: Value,
        shown: &str,
        position: &str,
    ) {
        let Some(Frame::Entity { draft, .. }) = self.stack.last_mut() else {
            return;
        };
        if draft.assign(field, value) == Assigned::Duplicate {
            self.reasons.push(
                position,
                &ReasonType::DuplicateElement,
                [field.name, shown.trim()],
            );
        }
    }

    /// The finished alert, or `None` if the document ended with elements still open
    fn finish(self) -> Option<(Alert, Reasons)> {
        if !self.stack.is_empty() {
            return None;
        }
        let alert = self.alert?;
        debug!(
            reasons = self.reasons.len(),
            info_blocks = alert.info.len(),
            "Finished streaming parse"
        );
        Some((alert, self.reasons))
    }
}

/// Outcome of coercing element text to a scalar field kind
#[derive(Debug, PartialEq)]
pub(crate) enum Coerced {
    Value(Value),
    /// Enum text with no matching constant; left for the schema check to report
    Unmatched,
    Invalid,
}

pub(crate) fn coerce(kind: FieldKind, text: &str) -> Coerced {
    let trimmed = text.trim();
    let value = match kind {
        FieldKind::Str => Some(Value::Str(text.to_string())),
        FieldKind::Int => trimmed.parse::<i64>().ok().map(Value::Int),
        FieldKind::Float => trimmed.parse::<f64>().ok().map(Value::Float),
        FieldKind::Bool => parse_bool(trimmed).map(Value::Bool),
        FieldKind::Enum(table) => {
            return table
                .resolve(trimmed)
                .map_or(Coerced::Unmatched, |index| Coerced::Value(Value::Enum(index)))
        }
        FieldKind::Entity(_) => None,
    };
    value.map_or(Coerced::Invalid, Coerced::Value)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
