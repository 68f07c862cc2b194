//! ABOUTME: Typed CAP alert tree (Alert, Info, Area, Resource and geometry values)
//! ABOUTME: Enumerations carry their wire tables so parsing and serializing share one casing

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::dates;
use crate::descriptor::EnumTable;

/// CAP protocol version, identified on the wire by the root element's namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Version {
    V1_0,
    V1_1,
    #[default]
    V1_2,
}

impl Version {
    pub const CAP10_XMLNS: &'static str = "http://www.incident.com/cap/1.0";
    pub const CAP11_XMLNS: &'static str = "urn:oasis:names:tc:emergency:cap:1.1";
    pub const CAP12_XMLNS: &'static str = "urn:oasis:names:tc:emergency:cap:1.2";

    pub const ALL: [Version; 3] = [Version::V1_0, Version::V1_1, Version::V1_2];

    /// Namespace URI written on the `<alert>` element
    pub fn xmlns(self) -> &'static str {
        match self {
            Version::V1_0 => Self::CAP10_XMLNS,
            Version::V1_1 => Self::CAP11_XMLNS,
            Version::V1_2 => Self::CAP12_XMLNS,
        }
    }

    /// Map a namespace URI to a version, `None` for anything that is not CAP
    pub fn from_xmlns(xmlns: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.xmlns() == xmlns)
    }

    /// Numeric form used in version comparisons: 10, 11 or 12
    pub fn number(self) -> u8 {
        match self {
            Version::V1_0 => 10,
            Version::V1_1 => 11,
            Version::V1_2 => 12,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1_0 => write!(f, "1.0"),
            Version::V1_1 => write!(f, "1.1"),
            Version::V1_2 => write!(f, "1.2"),
        }
    }
}

/// Behaviour shared by every CAP enumeration: a fixed variant order matching its [`EnumTable`]
pub trait CapEnum: Copy + PartialEq + 'static {
    const VARIANTS: &'static [Self];

    fn table() -> &'static EnumTable;

    fn index(self) -> usize {
        Self::VARIANTS
            .iter()
            .position(|variant| *variant == self)
            .unwrap_or_default()
    }

    fn from_index(index: usize) -> Option<Self> {
        Self::VARIANTS.get(index).copied()
    }

    /// Resolve document text with the enum's case-folding rules
    fn from_wire(text: &str) -> Option<Self> {
        Self::table().resolve(text).and_then(Self::from_index)
    }

    /// Text written to the wire for this value
    fn wire_value(self) -> String {
        Self::table().wire_value(self.index()).unwrap_or_default()
    }
}

macro_rules! cap_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $table:ident, $type_name:literal {
            $($variant:ident => $constant:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        pub static $table: EnumTable = EnumTable {
            type_name: $type_name,
            constants: &[$($constant),+],
        };

        impl CapEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            fn table() -> &'static EnumTable {
                &$table
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.wire_value())
            }
        }
    };
}

cap_enum! {
    /// CAP Alert status values
    Status, STATUS, "Status" {
        Actual => "ACTUAL",
        Exercise => "EXERCISE",
        System => "SYSTEM",
        Test => "TEST",
        Draft => "DRAFT",
    }
}

cap_enum! {
    /// CAP Alert message type values
    MsgType, MSG_TYPE, "MsgType" {
        Alert => "ALERT",
        Update => "UPDATE",
        Cancel => "CANCEL",
        Ack => "ACK",
        Error => "ERROR",
    }
}

cap_enum! {
    /// CAP Alert scope values
    Scope, SCOPE, "Scope" {
        Public => "PUBLIC",
        Restricted => "RESTRICTED",
        Private => "PRIVATE",
    }
}

cap_enum! {
    /// CAP Info category values
    Category, CATEGORY, "Category" {
        Geo => "GEO",
        Met => "MET",
        Safety => "SAFETY",
        Security => "SECURITY",
        Rescue => "RESCUE",
        Fire => "FIRE",
        Health => "HEALTH",
        Env => "ENV",
        Transport => "TRANSPORT",
        Infra => "INFRA",
        Cbrne => "CBRNE",
        Other => "OTHER",
    }
}

cap_enum! {
    /// CAP Info response type values; `Avoid` and `AllClear` arrived with 1.2
    ResponseType, RESPONSE_TYPE, "ResponseType" {
        Shelter => "SHELTER",
        Evacuate => "EVACUATE",
        Prepare => "PREPARE",
        Execute => "EXECUTE",
        Avoid => "AVOID",
        Monitor => "MONITOR",
        Assess => "ASSESS",
        AllClear => "ALL_CLEAR",
        None => "NONE",
    }
}

cap_enum! {
    /// CAP Info urgency values
    Urgency, URGENCY, "Urgency" {
        Immediate => "IMMEDIATE",
        Expected => "EXPECTED",
        Future => "FUTURE",
        Past => "PAST",
        Unknown => "UNKNOWN_URGENCY",
    }
}

cap_enum! {
    /// CAP Info severity values
    Severity, SEVERITY, "Severity" {
        Extreme => "EXTREME",
        Severe => "SEVERE",
        Moderate => "MODERATE",
        Minor => "MINOR",
        Unknown => "UNKNOWN_SEVERITY",
    }
}

cap_enum! {
    /// CAP Info certainty values; `VeryLikely` is the deprecated 1.0 "Very Likely"
    Certainty, CERTAINTY, "Certainty" {
        Observed => "OBSERVED",
        Likely => "LIKELY",
        Possible => "POSSIBLE",
        Unlikely => "UNLIKELY",
        Unknown => "UNKNOWN_CERTAINTY",
        VeryLikely => "VERY_LIKELY",
    }
}

/// Main CAP Alert message
///
/// Every element is optional here: required-ness depends on the protocol version
/// and is reported by the validator rather than enforced by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alert {
    /// Protocol version, written as the `xmlns` of `<alert>`
    pub version: Version,
    pub identifier: Option<String>,
    pub sender: Option<String>,
    /// CAP 1.0 only
    pub password: Option<String>,
    /// Timestamp text in the constrained CAP dateTime form
    pub sent: Option<String>,
    pub status: Option<Status>,
    pub msg_type: Option<MsgType>,
    pub source: Option<String>,
    pub scope: Option<Scope>,
    /// Only meaningful when scope is Restricted
    pub restriction: Option<String>,
    /// Only meaningful when scope is Private
    pub addresses: Option<Group>,
    pub code: Vec<String>,
    pub note: Option<String>,
    /// `sender,identifier,sent` triplets
    pub references: Option<Group>,
    pub incidents: Option<Group>,
    pub info: Vec<Info>,
}

impl Alert {
    /// Create an empty alert for the given version
    pub fn new(version: Version) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Parsed `sent` timestamp, if present and well formed
    pub fn sent_time(&self) -> Option<DateTime<FixedOffset>> {
        self.sent.as_deref().and_then(dates::parse_cap_date)
    }
}

/// CAP Info block containing alert details in one language
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub language: Option<String>,
    pub category: Vec<Category>,
    pub event: Option<String>,
    pub response_type: Vec<ResponseType>,
    pub urgency: Option<Urgency>,
    pub severity: Option<Severity>,
    pub certainty: Option<Certainty>,
    pub audience: Option<String>,
    pub event_code: Vec<ValuePair>,
    pub effective: Option<String>,
    pub onset: Option<String>,
    pub expires: Option<String>,
    pub sender_name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub web: Option<String>,
    pub contact: Option<String>,
    pub parameter: Vec<ValuePair>,
    pub resource: Vec<Resource>,
    pub area: Vec<Area>,
}

/// CAP Resource (media attachments)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub resource_desc: Option<String>,
    pub mime_type: Option<String>,
    /// Size in bytes
    pub size: Option<i64>,
    pub uri: Option<String>,
    /// Base64 encoded content
    pub deref_uri: Option<String>,
    pub digest: Option<String>,
}

/// CAP Area (geographic region)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Area {
    pub area_desc: Option<String>,
    pub polygon: Vec<Polygon>,
    pub circle: Vec<Circle>,
    pub geocode: Vec<ValuePair>,
    pub altitude: Option<f64>,
    /// Requires `altitude`, and must not be below it
    pub ceiling: Option<f64>,
}

/// WGS 84 coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A point and a radius in kilometers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Circle {
    pub point: Point,
    pub radius: f64,
}

/// Closed ring of points; a valid polygon has at least four, first equal to last
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub point: Vec<Point>,
}

impl Polygon {
    pub fn is_closed(&self) -> bool {
        match (self.point.first(), self.point.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

/// Ordered list of opaque values (addresses, references, incidents)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub value: Vec<String>,
}

impl Group {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            value: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Name/value pair used by eventCode, geocode and parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ValuePair {
    pub value_name: String,
    pub value: String,
}

impl ValuePair {
    pub fn new(value_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value_name: value_name.into(),
            value: value.into(),
        }
    }
}
