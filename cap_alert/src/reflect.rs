//! ABOUTME: Metadata-driven field access over the alert model
//! ABOUTME: Lets the parser assign and the serializers/sweep read fields by descriptor

use crate::descriptor::{EntityKind, EnumTable, FieldDescriptor};
use crate::model::*;

/// An owned value ready to be assigned to a field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Index into the field's enum table
    Enum(usize),
    Entity(EntityValue),
}

/// A finished child entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    Info(Info),
    Resource(Resource),
    Area(Area),
    Circle(Circle),
    Polygon(Polygon),
    Point(Point),
    Group(Group),
    ValuePair(ValuePair),
}

/// Outcome of assigning a value to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assigned {
    Set,
    Appended,
    /// Singular field already held a value; the new one was dropped
    Duplicate,
    /// Value kind does not fit the field
    Rejected,
}

/// A borrowed view of one field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(&'static EnumTable, usize),
    Entity(EntityRef<'a>),
}

/// A borrowed view of any entity in the tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityRef<'a> {
    Alert(&'a Alert),
    Info(&'a Info),
    Resource(&'a Resource),
    Area(&'a Area),
    Circle(&'a Circle),
    Polygon(&'a Polygon),
    Point(&'a Point),
    Group(&'a Group),
    ValuePair(&'a ValuePair),
}

impl<'a> EntityRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Alert(_) => EntityKind::Alert,
            EntityRef::Info(_) => EntityKind::Info,
            EntityRef::Resource(_) => EntityKind::Resource,
            EntityRef::Area(_) => EntityKind::Area,
            EntityRef::Circle(_) => EntityKind::Circle,
            EntityRef::Polygon(_) => EntityKind::Polygon,
            EntityRef::Point(_) => EntityKind::Point,
            EntityRef::Group(_) => EntityKind::Group,
            EntityRef::ValuePair(_) => EntityKind::ValuePair,
        }
    }

    /// Values held by `field`, in document order; empty when unset
    pub fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'a>> {
        match *self {
            EntityRef::Alert(e) => e.values(field),
            EntityRef::Info(e) => e.values(field),
            EntityRef::Resource(e) => e.values(field),
            EntityRef::Area(e) => e.values(field),
            EntityRef::Circle(e) => e.values(field),
            EntityRef::Polygon(e) => e.values(field),
            EntityRef::Point(e) => e.values(field),
            EntityRef::Group(e) => e.values(field),
            EntityRef::ValuePair(e) => e.values(field),
        }
    }
}

/// Field access for one model type
pub trait Entity {
    const KIND: EntityKind;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned;

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>>;

    fn entity_ref(&self) -> EntityRef<'_>;
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Assigned {
    if slot.is_some() {
        return Assigned::Duplicate;
    }
    *slot = Some(value);
    Assigned::Set
}

fn set_enum<E: CapEnum>(slot: &mut Option<E>, index: usize) -> Assigned {
    match E::from_index(index) {
        Some(value) => set_once(slot, value),
        None => Assigned::Rejected,
    }
}

fn push_enum<E: CapEnum>(list: &mut Vec<E>, index: usize) -> Assigned {
    match E::from_index(index) {
        Some(value) => {
            list.push(value);
            Assigned::Appended
        }
        None => Assigned::Rejected,
    }
}

fn push<T>(list: &mut Vec<T>, value: T) -> Assigned {
    list.push(value);
    Assigned::Appended
}

fn set_text(slot: &mut String, value: String) -> Assigned {
    if !slot.is_empty() {
        return Assigned::Duplicate;
    }
    *slot = value;
    Assigned::Set
}

fn text(value: &Option<String>) -> Vec<FieldValue<'_>> {
    value.as_deref().map(FieldValue::Str).into_iter().collect()
}

fn enum_value<E: CapEnum>(value: &Option<E>) -> Vec<FieldValue<'static>> {
    value
        .map(|v| FieldValue::Enum(E::table(), v.index()))
        .into_iter()
        .collect()
}

fn enum_values<E: CapEnum>(values: &[E]) -> Vec<FieldValue<'static>> {
    values
        .iter()
        .map(|v| FieldValue::Enum(E::table(), v.index()))
        .collect()
}

fn entities<'a, T: Entity>(values: impl IntoIterator<Item = &'a T>) -> Vec<FieldValue<'a>>
where
    T: 'a,
{
    values
        .into_iter()
        .map(|v| FieldValue::Entity(v.entity_ref()))
        .collect()
}

impl Entity for Alert {
    const KIND: EntityKind = EntityKind::Alert;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("identifier", Value::Str(s)) => set_once(&mut self.identifier, s),
            ("sender", Value::Str(s)) => set_once(&mut self.sender, s),
            ("password", Value::Str(s)) => set_once(&mut self.password, s),
            ("sent", Value::Str(s)) => set_once(&mut self.sent, s),
            ("status", Value::Enum(i)) => set_enum(&mut self.status, i),
            ("msgType", Value::Enum(i)) => set_enum(&mut self.msg_type, i),
            ("source", Value::Str(s)) => set_once(&mut self.source, s),
            ("scope", Value::Enum(i)) => set_enum(&mut self.scope, i),
            ("restriction", Value::Str(s)) => set_once(&mut self.restriction, s),
            ("addresses", Value::Entity(EntityValue::Group(g))) => {
                set_once(&mut self.addresses, g)
            }
            ("code", Value::Str(s)) => push(&mut self.code, s),
            ("note", Value::Str(s)) => set_once(&mut self.note, s),
            ("references", Value::Entity(EntityValue::Group(g))) => {
                set_once(&mut self.references, g)
            }
            ("incidents", Value::Entity(EntityValue::Group(g))) => {
                set_once(&mut self.incidents, g)
            }
            ("info", Value::Entity(EntityValue::Info(i))) => push(&mut self.info, i),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "identifier" => text(&self.identifier),
            "sender" => text(&self.sender),
            "password" => text(&self.password),
            "sent" => text(&self.sent),
            "status" => enum_value(&self.status),
            "msgType" => enum_value(&self.msg_type),
            "source" => text(&self.source),
            "scope" => enum_value(&self.scope),
            "restriction" => text(&self.restriction),
            "addresses" => entities(&self.addresses),
            "code" => self.code.iter().map(|c| FieldValue::Str(c)).collect(),
            "note" => text(&self.note),
            "references" => entities(&self.references),
            "incidents" => entities(&self.incidents),
            "info" => entities(&self.info),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Alert(self)
    }
}

impl Entity for Info {
    const KIND: EntityKind = EntityKind::Info;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("language", Value::Str(s)) => set_once(&mut self.language, s),
            ("category", Value::Enum(i)) => push_enum(&mut self.category, i),
            ("event", Value::Str(s)) => set_once(&mut self.event, s),
            ("responseType", Value::Enum(i)) => push_enum(&mut self.response_type, i),
            ("urgency", Value::Enum(i)) => set_enum(&mut self.urgency, i),
            ("severity", Value::Enum(i)) => set_enum(&mut self.severity, i),
            ("certainty", Value::Enum(i)) => set_enum(&mut self.certainty, i),
            ("audience", Value::Str(s)) => set_once(&mut self.audience, s),
            ("eventCode", Value::Entity(EntityValue::ValuePair(p))) => {
                push(&mut self.event_code, p)
            }
            ("effective", Value::Str(s)) => set_once(&mut self.effective, s),
            ("onset", Value::Str(s)) => set_once(&mut self.onset, s),
            ("expires", Value::Str(s)) => set_once(&mut self.expires, s),
            ("senderName", Value::Str(s)) => set_once(&mut self.sender_name, s),
            ("headline", Value::Str(s)) => set_once(&mut self.headline, s),
            ("description", Value::Str(s)) => set_once(&mut self.description, s),
            ("instruction", Value::Str(s)) => set_once(&mut self.instruction, s),
            ("web", Value::Str(s)) => set_once(&mut self.web, s),
            ("contact", Value::Str(s)) => set_once(&mut self.contact, s),
            ("parameter", Value::Entity(EntityValue::ValuePair(p))) => {
                push(&mut self.parameter, p)
            }
            ("resource", Value::Entity(EntityValue::Resource(r))) => push(&mut self.resource, r),
            ("area", Value::Entity(EntityValue::Area(a))) => push(&mut self.area, a),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "language" => text(&self.language),
            "category" => enum_values(&self.category),
            "event" => text(&self.event),
            "responseType" => enum_values(&self.response_type),
            "urgency" => enum_value(&self.urgency),
            "severity" => enum_value(&self.severity),
            "certainty" => enum_value(&self.certainty),
            "audience" => text(&self.audience),
            "eventCode" => entities(&self.event_code),
            "effective" => text(&self.effective),
            "onset" => text(&self.onset),
            "expires" => text(&self.expires),
            "senderName" => text(&self.sender_name),
            "headline" => text(&self.headline),
            "description" => text(&self.description),
            "instruction" => text(&self.instruction),
            "web" => text(&self.web),
            "contact" => text(&self.contact),
            "parameter" => entities(&self.parameter),
            "resource" => entities(&self.resource),
            "area" => entities(&self.area),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Info(self)
    }
}

impl Entity for Resource {
    const KIND: EntityKind = EntityKind::Resource;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("resourceDesc", Value::Str(s)) => set_once(&mut self.resource_desc, s),
            ("mimeType", Value::Str(s)) => set_once(&mut self.mime_type, s),
            ("size", Value::Int(n)) => set_once(&mut self.size, n),
            ("uri", Value::Str(s)) => set_once(&mut self.uri, s),
            ("derefUri", Value::Str(s)) => set_once(&mut self.deref_uri, s),
            ("digest", Value::Str(s)) => set_once(&mut self.digest, s),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "resourceDesc" => text(&self.resource_desc),
            "mimeType" => text(&self.mime_type),
            "size" => self.size.map(FieldValue::Int).into_iter().collect(),
            "uri" => text(&self.uri),
            "derefUri" => text(&self.deref_uri),
            "digest" => text(&self.digest),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Resource(self)
    }
}

impl Entity for Area {
    const KIND: EntityKind = EntityKind::Area;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("areaDesc", Value::Str(s)) => set_once(&mut self.area_desc, s),
            ("polygon", Value::Entity(EntityValue::Polygon(p))) => push(&mut self.polygon, p),
            ("circle", Value::Entity(EntityValue::Circle(c))) => push(&mut self.circle, c),
            ("geocode", Value::Entity(EntityValue::ValuePair(p))) => push(&mut self.geocode, p),
            ("altitude", Value::Float(f)) => set_once(&mut self.altitude, f),
            ("ceiling", Value::Float(f)) => set_once(&mut self.ceiling, f),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "areaDesc" => text(&self.area_desc),
            "polygon" => entities(&self.polygon),
            "circle" => entities(&self.circle),
            "geocode" => entities(&self.geocode),
            "altitude" => self.altitude.map(FieldValue::Float).into_iter().collect(),
            "ceiling" => self.ceiling.map(FieldValue::Float).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Area(self)
    }
}

impl Entity for Circle {
    const KIND: EntityKind = EntityKind::Circle;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("point", Value::Entity(EntityValue::Point(p))) => {
                self.point = p;
                Assigned::Set
            }
            ("radius", Value::Float(f)) => {
                self.radius = f;
                Assigned::Set
            }
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "point" => vec![FieldValue::Entity(EntityRef::Point(&self.point))],
            "radius" => vec![FieldValue::Float(self.radius)],
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Circle(self)
    }
}

impl Entity for Polygon {
    const KIND: EntityKind = EntityKind::Polygon;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("point", Value::Entity(EntityValue::Point(p))) => push(&mut self.point, p),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "point" => entities(&self.point),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Polygon(self)
    }
}

impl Entity for Point {
    const KIND: EntityKind = EntityKind::Point;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("latitude", Value::Float(f)) => {
                self.latitude = f;
                Assigned::Set
            }
            ("longitude", Value::Float(f)) => {
                self.longitude = f;
                Assigned::Set
            }
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "latitude" => vec![FieldValue::Float(self.latitude)],
            "longitude" => vec![FieldValue::Float(self.longitude)],
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Point(self)
    }
}

impl Entity for Group {
    const KIND: EntityKind = EntityKind::Group;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("value", Value::Str(s)) => push(&mut self.value, s),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "value" => self.value.iter().map(|v| FieldValue::Str(v)).collect(),
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Group(self)
    }
}

impl Entity for ValuePair {
    const KIND: EntityKind = EntityKind::ValuePair;

    fn assign(&mut self, field: &FieldDescriptor, value: Value) -> Assigned {
        match (field.name, value) {
            ("valueName", Value::Str(s)) => set_text(&mut self.value_name, s),
            ("value", Value::Str(s)) => set_text(&mut self.value, s),
            _ => Assigned::Rejected,
        }
    }

    fn values(&self, field: &FieldDescriptor) -> Vec<FieldValue<'_>> {
        match field.name {
            "valueName" => vec![FieldValue::Str(&self.value_name)],
            "value" => vec![FieldValue::Str(&self.value)],
            _ => Vec::new(),
        }
    }

    fn entity_ref(&self) -> EntityRef<'_> {
        EntityRef::ValuePair(self)
    }
}
