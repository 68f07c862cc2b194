//! ABOUTME: Static field metadata for every CAP entity, in schema sequence order
//! ABOUTME: Drives the parser, validators and both serializers without per-format field lists

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::model::{
    Version, CATEGORY, CERTAINTY, MSG_TYPE, RESPONSE_TYPE, SCOPE, SEVERITY, STATUS, URGENCY,
};

/// Casing exceptions where the wire text is not the UpperCamel form of the constant
const ENUM_CASING_EXCEPTIONS: &[(&str, &str)] = &[
    ("VERY_LIKELY", "Very Likely"),
    ("CBRNE", "CBRNE"),
    ("UNKNOWN_URGENCY", "Unknown"),
    ("UNKNOWN_SEVERITY", "Unknown"),
    ("UNKNOWN_CERTAINTY", "Unknown"),
];

/// Constants of one CAP enumeration in declaration order
#[derive(Debug, PartialEq, Eq)]
pub struct EnumTable {
    pub type_name: &'static str,
    pub constants: &'static [&'static str],
}

impl EnumTable {
    /// Resolve document text to a constant index
    ///
    /// "Very Likely" maps directly; otherwise the text is underscore-cased and
    /// upper-cased, then retried with the type name appended ("Unknown" becomes
    /// `UNKNOWN_URGENCY` for urgency).
    pub fn resolve(&self, text: &str) -> Option<usize> {
        let text = text.trim();
        let constant = if text == "Very Likely" {
            "VERY_LIKELY".to_string()
        } else {
            underscore_case(text).to_uppercase()
        };
        self.position(&constant).or_else(|| {
            self.position(&format!("{}_{}", constant, self.type_name.to_uppercase()))
        })
    }

    pub fn wire_value(&self, index: usize) -> Option<String> {
        self.constants.get(index).map(|constant| enum_wire_text(constant))
    }

    pub fn wire_values(&self) -> Vec<String> {
        self.constants.iter().map(|c| enum_wire_text(c)).collect()
    }

    fn position(&self, constant: &str) -> Option<usize> {
        self.constants.iter().position(|c| *c == constant)
    }
}

fn enum_wire_text(constant: &str) -> String {
    ENUM_CASING_EXCEPTIONS
        .iter()
        .find(|(name, _)| *name == constant)
        .map(|(_, wire)| wire.to_string())
        .unwrap_or_else(|| camel_case(constant))
}

/// Insert `_` wherever an upper-case letter follows a lower-case one
pub fn underscore_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut previous_lower = false;
    for c in text.chars() {
        if c.is_uppercase() && previous_lower {
            out.push('_');
        }
        previous_lower = c.is_lowercase();
        out.push(c);
    }
    out
}

/// `ALL_CLEAR` to `AllClear`
pub fn camel_case(constant: &str) -> String {
    constant
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Case-folded identifier used to match element names against field names
fn field_id(name: &str) -> String {
    underscore_case(name).to_lowercase()
}

/// Kind of CAP entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Alert,
    Info,
    Resource,
    Area,
    Circle,
    Polygon,
    Point,
    Group,
    ValuePair,
}

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    /// No CAP element carries a boolean; kept so coercion covers every scalar kind
    Bool,
    Enum(&'static EnumTable),
    Entity(EntityKind),
}

/// One named field of an entity
#[derive(Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Element name as written in CAP documents
    pub name: &'static str,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl FieldDescriptor {
    const fn one(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: false,
        }
    }

    const fn many(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: true,
        }
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self.kind {
            FieldKind::Entity(kind) => Some(kind),
            _ => None,
        }
    }
}

use FieldKind::{Entity, Enum, Float, Int, Str};

static ALERT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("identifier", Str),
    FieldDescriptor::one("sender", Str),
    FieldDescriptor::one("password", Str),
    FieldDescriptor::one("sent", Str),
    FieldDescriptor::one("status", Enum(&STATUS)),
    FieldDescriptor::one("msgType", Enum(&MSG_TYPE)),
    FieldDescriptor::one("source", Str),
    FieldDescriptor::one("scope", Enum(&SCOPE)),
    FieldDescriptor::one("restriction", Str),
    FieldDescriptor::one("addresses", Entity(EntityKind::Group)),
    FieldDescriptor::many("code", Str),
    FieldDescriptor::one("note", Str),
    FieldDescriptor::one("references", Entity(EntityKind::Group)),
    FieldDescriptor::one("incidents", Entity(EntityKind::Group)),
    FieldDescriptor::many("info", Entity(EntityKind::Info)),
];

static INFO_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("language", Str),
    FieldDescriptor::many("category", Enum(&CATEGORY)),
    FieldDescriptor::one("event", Str),
    FieldDescriptor::many("responseType", Enum(&RESPONSE_TYPE)),
    FieldDescriptor::one("urgency", Enum(&URGENCY)),
    FieldDescriptor::one("severity", Enum(&SEVERITY)),
    FieldDescriptor::one("certainty", Enum(&CERTAINTY)),
    FieldDescriptor::one("audience", Str),
    FieldDescriptor::many("eventCode", Entity(EntityKind::ValuePair)),
    FieldDescriptor::one("effective", Str),
    FieldDescriptor::one("onset", Str),
    FieldDescriptor::one("expires", Str),
    FieldDescriptor::one("senderName", Str),
    FieldDescriptor::one("headline", Str),
    FieldDescriptor::one("description", Str),
    FieldDescriptor::one("instruction", Str),
    FieldDescriptor::one("web", Str),
    FieldDescriptor::one("contact", Str),
    FieldDescriptor::many("parameter", Entity(EntityKind::ValuePair)),
    FieldDescriptor::many("resource", Entity(EntityKind::Resource)),
    FieldDescriptor::many("area", Entity(EntityKind::Area)),
];

static RESOURCE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("resourceDesc", Str),
    FieldDescriptor::one("mimeType", Str),
    FieldDescriptor::one("size", Int),
    FieldDescriptor::one("uri", Str),
    FieldDescriptor::one("derefUri", Str),
    FieldDescriptor::one("digest", Str),
];

static AREA_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("areaDesc", Str),
    FieldDescriptor::many("polygon", Entity(EntityKind::Polygon)),
    FieldDescriptor::many("circle", Entity(EntityKind::Circle)),
    FieldDescriptor::many("geocode", Entity(EntityKind::ValuePair)),
    FieldDescriptor::one("altitude", Float),
    FieldDescriptor::one("ceiling", Float),
];

static CIRCLE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("point", Entity(EntityKind::Point)),
    FieldDescriptor::one("radius", Float),
];

static POLYGON_FIELDS: &[FieldDescriptor] =
    &[FieldDescriptor::many("point", Entity(EntityKind::Point))];

static POINT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("latitude", Float),
    FieldDescriptor::one("longitude", Float),
];

static GROUP_FIELDS: &[FieldDescriptor] = &[FieldDescriptor::many("value", Str)];

static VALUE_PAIR_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::one("valueName", Str),
    FieldDescriptor::one("value", Str),
];

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Alert,
        EntityKind::Info,
        EntityKind::Resource,
        EntityKind::Area,
        EntityKind::Circle,
        EntityKind::Polygon,
        EntityKind::Point,
        EntityKind::Group,
        EntityKind::ValuePair,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Alert => "alert",
            EntityKind::Info => "info",
            EntityKind::Resource => "resource",
            EntityKind::Area => "area",
            EntityKind::Circle => "circle",
            EntityKind::Polygon => "polygon",
            EntityKind::Point => "point",
            EntityKind::Group => "group",
            EntityKind::ValuePair => "valuePair",
        }
    }

    /// Fields in schema sequence order
    pub fn fields(self) -> &'static [FieldDescriptor] {
        match self {
            EntityKind::Alert => ALERT_FIELDS,
            EntityKind::Info => INFO_FIELDS,
            EntityKind::Resource => RESOURCE_FIELDS,
            EntityKind::Area => AREA_FIELDS,
            EntityKind::Circle => CIRCLE_FIELDS,
            EntityKind::Polygon => POLYGON_FIELDS,
            EntityKind::Point => POINT_FIELDS,
            EntityKind::Group => GROUP_FIELDS,
            EntityKind::ValuePair => VALUE_PAIR_FIELDS,
        }
    }

    /// Whether values of this kind travel as a single text element on the wire
    pub fn is_text_composite(self) -> bool {
        matches!(
            self,
            EntityKind::Circle | EntityKind::Polygon | EntityKind::Point | EntityKind::Group
        )
    }

    /// Whether this kind is written as delimited text rather than child elements
    ///
    /// Value pairs only became structured in CAP 1.1.
    pub fn is_text_encoded(self, version: Version) -> bool {
        self.is_text_composite() || (self == EntityKind::ValuePair && version == Version::V1_0)
    }

    /// Find a field by element name, case-folded (`msgType` matches `msg_type`)
    pub fn field(self, element: &str) -> Option<(usize, &'static FieldDescriptor)> {
        static INDEX: OnceLock<HashMap<(EntityKind, String), usize>> = OnceLock::new();
        let index = INDEX.get_or_init(|| {
            EntityKind::ALL
                .iter()
                .flat_map(|kind| {
                    kind.fields()
                        .iter()
                        .enumerate()
                        .map(move |(i, f)| ((*kind, field_id(f.name)), i))
                })
                .collect()
        });
        let position = *index.get(&(self, field_id(element)))?;
        Some((position, &self.fields()[position]))
    }
}

/// Fields that must be present on an entity for the given protocol version
pub fn required_fields(kind: EntityKind, version: Version) -> Vec<&'static str> {
    let mut required = match kind {
        EntityKind::Alert => vec!["identifier", "sender", "sent", "status", "msgType"],
        EntityKind::Info => vec!["event", "urgency", "severity", "certainty"],
        EntityKind::Area => vec!["areaDesc"],
        EntityKind::Resource => vec!["resourceDesc"],
        EntityKind::ValuePair => vec!["valueName", "value"],
        _ => Vec::new(),
    };
    if version >= Version::V1_1 {
        match kind {
            EntityKind::Alert => required.push("scope"),
            EntityKind::Info => required.insert(0, "category"),
            _ => {}
        }
    }
    if version >= Version::V1_2 && kind == EntityKind::Resource {
        required.push("mimeType");
    }
    required
}

/// Names of the child fields that can repeat under each entity kind
///
/// The JSON serializer renders these as arrays even when a document holds only one.
pub fn repeated_field_names(kind: EntityKind) -> &'static HashSet<&'static str> {
    static NAMES: OnceLock<HashMap<EntityKind, HashSet<&'static str>>> = OnceLock::new();
    static NONE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    let names = NAMES.get_or_init(|| {
        let mut names = HashMap::new();
        collect_repeated(EntityKind::Alert, &mut names);
        names
    });
    names
        .get(&kind)
        .unwrap_or_else(|| NONE.get_or_init(HashSet::new))
}

fn collect_repeated(kind: EntityKind, names: &mut HashMap<EntityKind, HashSet<&'static str>>) {
    if names.contains_key(&kind) {
        return;
    }
    let repeated = kind
        .fields()
        .iter()
        .filter(|field| field.repeated)
        .map(|field| field.name)
        .collect();
    names.insert(kind, repeated);
    for field in kind.fields() {
        if let Some(child) = field.entity_kind() {
            collect_repeated(child, names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscore_case() {
        assert_eq!(underscore_case("AllClear"), "All_Clear");
        assert_eq!(underscore_case("msgType"), "msg_Type");
        assert_eq!(underscore_case("CBRNE"), "CBRNE");
        assert_eq!(underscore_case("Very Likely"), "Very Likely");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("ALL_CLEAR"), "AllClear");
        assert_eq!(camel_case("ACTUAL"), "Actual");
    }

    #[test]
    fn test_resolve_appends_type_name() {
        assert_eq!(URGENCY.resolve("Unknown"), Some(4));
        assert_eq!(URGENCY.resolve(" Immediate "), Some(0));
        assert_eq!(URGENCY.resolve("Very Likely"), None);
        assert_eq!(RESPONSE_TYPE.resolve("AllClear"), Some(7));
    }

    #[test]
    fn test_field_lookup_by_element_name() {
        let (index, field) = EntityKind::Alert.field("msgType").unwrap();
        assert_eq!(index, 5);
        assert_eq!(field.name, "msgType");
        assert!(EntityKind::Alert.field("msgtype").is_none());
        assert_eq!(EntityKind::Info.field("responseType").unwrap().1.name, "responseType");
        assert!(EntityKind::Alert.field("Signature").is_none());
        assert!(EntityKind::Alert.field("headline").is_none());
    }

    #[test]
    fn test_required_fields_by_version() {
        assert!(!required_fields(EntityKind::Info, Version::V1_0).contains(&"category"));
        assert!(required_fields(EntityKind::Info, Version::V1_1).contains(&"category"));
        assert!(!required_fields(EntityKind::Alert, Version::V1_0).contains(&"scope"));
        assert!(required_fields(EntityKind::Alert, Version::V1_2).contains(&"scope"));
        assert!(!required_fields(EntityKind::Resource, Version::V1_1).contains(&"mimeType"));
        assert!(required_fields(EntityKind::Resource, Version::V1_2).contains(&"mimeType"));
    }

    #[test]
    fn test_repeated_field_names() {
        let alert = repeated_field_names(EntityKind::Alert);
        assert!(alert.contains("code"));
        assert!(alert.contains("info"));
        assert!(!alert.contains("identifier"));
        assert!(!alert.contains("addresses"));

        let info = repeated_field_names(EntityKind::Info);
        for name in ["category", "responseType", "eventCode", "parameter", "resource", "area"] {
            assert!(info.contains(name), "missing {name}");
        }
        assert!(repeated_field_names(EntityKind::Group).contains("value"));
        assert!(!repeated_field_names(EntityKind::ValuePair).contains("value"));
    }
}
