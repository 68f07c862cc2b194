//! ABOUTME: Severity-leveled diagnostics bound to XPath positions
//! ABOUTME: Reason types carry a default level and a parameterized message template

use std::collections::BTreeMap;
use std::fmt;

use crate::CapError;

/// Diagnostic severity, ordered `Info < Recommendation < Warning < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Recommendation,
    Warning,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Info,
        Level::Recommendation,
        Level::Warning,
        Level::Error,
    ];

    /// Every level strictly above this one, ascending
    pub fn higher_levels(self) -> Vec<Level> {
        Self::ALL.into_iter().filter(|l| *l > self).collect()
    }

    pub fn parse(text: &str) -> Option<Level> {
        match text.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Level::Info),
            "recommendation" => Some(Level::Recommendation),
            "warning" => Some(Level::Warning),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Info => "INFO",
            Level::Recommendation => "RECOMMENDATION",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A kind of finding produced by some rule set
///
/// Templates use positional `{0}`, `{1}` placeholders filled from the reason's parameters.
pub trait ReasonKind: fmt::Debug + Send + Sync {
    fn code(&self) -> &'static str;

    fn message_template(&self) -> &'static str;

    fn default_level(&self) -> Level;

    /// Rule set that produced the finding
    fn source(&self) -> &'static str {
        "CAP"
    }
}

/// Findings produced by the CAP parser, schema check and validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonType {
    AddressesScopeMismatch,
    CertaintyVeryLikelyDeprecated,
    CircularReference,
    DuplicateElement,
    EmptyElement,
    InvalidAltitudeCeilingRange,
    InvalidArea,
    InvalidCircle,
    InvalidCircleRadius,
    InvalidDate,
    InvalidDerefUri,
    InvalidEnumValue,
    InvalidIdentifier,
    InvalidLanguage,
    InvalidLatitude,
    InvalidLongitude,
    InvalidMimeType,
    InvalidPolygon,
    InvalidPolygonClosure,
    InvalidPolygonPointCount,
    InvalidReferences,
    InvalidResourceSize,
    InvalidSender,
    InvalidSequence,
    InvalidUri,
    InvalidValue,
    InvalidWeb,
    MissingRequiredElement,
    PasswordDeprecated,
    RelativeUriMissingDerefUri,
    RestrictionScopeMismatch,
    UnsupportedElement,
    PostdatedReference,
    SameTextDifferentLanguage,
    TextContainsHtmlEntities,
    TextContainsHtmlTags,
    InconsistentCategories,
    InconsistentEventCodes,
}

impl ReasonKind for ReasonType {
    fn code(&self) -> &'static str {
        use ReasonType::*;
        match self {
            AddressesScopeMismatch => "ADDRESSES_SCOPE_MISMATCH",
            CertaintyVeryLikelyDeprecated => "CERTAINTY_VERY_LIKELY_DEPRECATED",
            CircularReference => "CIRCULAR_REFERENCE",
            DuplicateElement => "DUPLICATE_ELEMENT",
            EmptyElement => "EMPTY_ELEMENT",
            InvalidAltitudeCeilingRange => "INVALID_ALTITUDE_CEILING_RANGE",
            InvalidArea => "INVALID_AREA",
            InvalidCircle => "INVALID_CIRCLE",
            InvalidCircleRadius => "INVALID_CIRCLE_RADIUS",
            InvalidDate => "INVALID_DATE",
            InvalidDerefUri => "INVALID_DEREF_URI",
            InvalidEnumValue => "INVALID_ENUM_VALUE",
            InvalidIdentifier => "INVALID_IDENTIFIER",
            InvalidLanguage => "INVALID_LANGUAGE",
            InvalidLatitude => "INVALID_LATITUDE",
            InvalidLongitude => "INVALID_LONGITUDE",
            InvalidMimeType => "INVALID_MIME_TYPE",
            InvalidPolygon => "INVALID_POLYGON",
            InvalidPolygonClosure => "INVALID_POLYGON_CLOSURE",
            InvalidPolygonPointCount => "INVALID_POLYGON_POINT_COUNT",
            InvalidReferences => "INVALID_REFERENCES",
            InvalidResourceSize => "INVALID_RESOURCE_SIZE",
            InvalidSender => "INVALID_SENDER",
            InvalidSequence => "INVALID_SEQUENCE",
            InvalidUri => "INVALID_URI",
            InvalidValue => "INVALID_VALUE",
            InvalidWeb => "INVALID_WEB",
            MissingRequiredElement => "MISSING_REQUIRED_ELEMENT",
            PasswordDeprecated => "PASSWORD_DEPRECATED",
            RelativeUriMissingDerefUri => "RELATIVE_URI_MISSING_DEREF_URI",
            RestrictionScopeMismatch => "RESTRICTION_SCOPE_MISMATCH",
            UnsupportedElement => "UNSUPPORTED_ELEMENT",
            PostdatedReference => "POSTDATED_REFERENCE",
            SameTextDifferentLanguage => "SAME_TEXT_DIFFERENT_LANGUAGE",
            TextContainsHtmlEntities => "TEXT_CONTAINS_HTML_ENTITIES",
            TextContainsHtmlTags => "TEXT_CONTAINS_HTML_TAGS",
            InconsistentCategories => "INCONSISTENT_CATEGORIES",
            InconsistentEventCodes => "INCONSISTENT_EVENT_CODES",
        }
    }

    fn message_template(&self) -> &'static str {
        use ReasonType::*;
        match self {
            AddressesScopeMismatch => {
                "<addresses> should only be used when <scope> is Private."
            }
            CertaintyVeryLikelyDeprecated => {
                "<certainty> \"Very Likely\" has been deprecated. Use Likely instead."
            }
            CircularReference => "Invalid <references>: \"{0}\". Alert cannot reference itself.",
            DuplicateElement => "Invalid duplicate <{0}>, ignoring \"{1}\".",
            EmptyElement => "<{0}> must not be empty or whitespace only.",
            InvalidAltitudeCeilingRange => {
                "Invalid <area>; <ceiling> must be greater than or equal to <altitude>."
            }
            InvalidArea => "Invalid <area>; <ceiling> requires <altitude>.",
            InvalidCircle => {
                "Invalid <circle> \"{0}\". Must be formatted like: \"-12.345,67.89 15.2\"."
            }
            InvalidCircleRadius => "Invalid <circle> radius {0}. Must not be negative.",
            InvalidDate => {
                "Invalid <{0}>: \"{1}\". Must be formatted like \"2002-05-24T16:49:00-07:00\"."
            }
            InvalidDerefUri => "Invalid <derefUri>. Must be base64 encoded data.",
            InvalidEnumValue => "Invalid enum value <{0}> = \"{1}\". Must be one of {2}.",
            InvalidIdentifier => {
                "Invalid <identifier>: \"{0}\". Must not include spaces, commas, < or &."
            }
            InvalidLanguage => "Invalid <language>: \"{0}\". Must be formatted like \"en-US\".",
            InvalidLatitude => "Invalid latitude {0}. Must be between -90 and 90.",
            InvalidLongitude => "Invalid longitude {0}. Must be between -180 and 180.",
            InvalidMimeType => "Invalid <mimeType>: \"{0}\". Must be formatted like \"image/png\".",
            InvalidPolygon => {
                "Invalid <polygon> \"{0}\". Must be formatted like: \"1,1 2,2 3,1 1,1\"."
            }
            InvalidPolygonClosure => "Invalid <polygon>; the first and last points must be equal.",
            InvalidPolygonPointCount => "Invalid <polygon>; {0} points given, at least 4 required.",
            InvalidReferences => {
                "Invalid <references>: \"{0}\". Must be formatted like \"sender,identifier,sent\"."
            }
            InvalidResourceSize => "Invalid <size> {0}. Must not be negative.",
            InvalidSender => "Invalid <sender>: \"{0}\". Must not include spaces, commas, < or &.",
            InvalidSequence => "<{0}> is out of order; it must come before <{1}>.",
            InvalidUri => "Invalid <uri>: \"{0}\".",
            InvalidValue => "Unsupported value <{0}> = \"{1}\".",
            InvalidWeb => "Invalid <web>: \"{0}\". Must be a full absolute URI.",
            MissingRequiredElement => "Missing required element <{0}>.",
            PasswordDeprecated => "<password> has been deprecated and is no longer supported.",
            RelativeUriMissingDerefUri => "Relative <uri> \"{0}\" requires <derefUri>.",
            RestrictionScopeMismatch => {
                "<restriction> should only be used when <scope> is Restricted."
            }
            UnsupportedElement => "Unsupported element <{0}>.",
            PostdatedReference => {
                "<references> contains a reference \"{0}\" sent after this alert."
            }
            SameTextDifferentLanguage => {
                "<{0}> has the same text in languages \"{1}\" and \"{2}\"."
            }
            TextContainsHtmlEntities => "<{0}> should not contain HTML entities.",
            TextContainsHtmlTags => "<{0}> should not contain HTML tags.",
            InconsistentCategories => "<category> values differ from the first <info>.",
            InconsistentEventCodes => "<eventCode> values differ from the first <info>.",
        }
    }

    fn default_level(&self) -> Level {
        use ReasonType::*;
        match self {
            PostdatedReference
            | SameTextDifferentLanguage
            | TextContainsHtmlEntities
            | TextContainsHtmlTags => Level::Warning,
            InconsistentCategories | InconsistentEventCodes => Level::Recommendation,
            _ => Level::Error,
        }
    }
}

/// One finding: a position, a kind and the parameters for its message
#[derive(Debug, Clone)]
pub struct Reason {
    xpath: String,
    kind: &'static dyn ReasonKind,
    level: Level,
    params: Vec<String>,
}

impl Reason {
    pub fn new<I, S>(xpath: impl Into<String>, kind: &'static dyn ReasonKind, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            xpath: xpath.into(),
            kind,
            level: kind.default_level(),
            params: params.into_iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    pub fn kind(&self) -> &'static dyn ReasonKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn source(&self) -> &'static str {
        self.kind.source()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Template with every `{n}` replaced by the n-th parameter
    ///
    /// Substitution is a single pass, so placeholders inside a parameter stay literal.
    pub fn message(&self) -> String {
        let template = self.kind.message_template();
        let mut message = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            message.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let param = after.find('}').and_then(|close| {
                let index = after[..close].parse::<usize>().ok()?;
                Some((self.params.get(index)?, close))
            });
            match param {
                Some((param, close)) => {
                    message.push_str(param);
                    rest = &after[close + 1..];
                }
                None => {
                    message.push('{');
                    rest = after;
                }
            }
        }
        message.push_str(rest);
        message
    }

    /// Same finding re-addressed under an outer document position
    pub fn prefix_with_xpath(&self, prefix: &str) -> Self {
        Self {
            xpath: format!("{}{}", prefix, self.xpath),
            ..self.clone()
        }
    }
}

impl PartialEq for Reason {
    fn eq(&self, other: &Self) -> bool {
        self.xpath == other.xpath
            && self.code() == other.code()
            && self.source() == other.source()
            && self.level == other.level
            && self.params == other.params
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.xpath, self.message())
    }
}

/// Findings bucketed by level, insertion order kept within a level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reasons {
    by_level: BTreeMap<Level, Vec<Reason>>,
}

impl Reasons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reason: Reason) {
        self.by_level.entry(reason.level()).or_default().push(reason);
    }

    /// Shorthand for `add(Reason::new(..))`
    pub fn push<I, S>(&mut self, xpath: impl Into<String>, kind: &'static dyn ReasonKind, params: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.add(Reason::new(xpath, kind, params));
    }

    /// Record a finding whose message takes no parameters
    pub fn push_plain(&mut self, xpath: impl Into<String>, kind: &'static dyn ReasonKind) {
        self.add(Reason::new(xpath, kind, Vec::<String>::new()));
    }

    pub fn extend(&mut self, other: Reasons) {
        for reason in other {
            self.add(reason);
        }
    }

    pub fn len(&self) -> usize {
        self.by_level.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All findings, ascending by level
    pub fn iter(&self) -> impl Iterator<Item = &Reason> {
        self.by_level.values().flatten()
    }

    pub fn get_with_level(&self, level: Level) -> Vec<&Reason> {
        self.by_level
            .get(&level)
            .map(|reasons| reasons.iter().collect())
            .unwrap_or_default()
    }

    pub fn get_with_level_or_higher(&self, level: Level) -> Vec<&Reason> {
        self.by_level.range(level..).flat_map(|(_, r)| r).collect()
    }

    pub fn contains_with_level(&self, level: Level) -> bool {
        self.by_level.get(&level).is_some_and(|r| !r.is_empty())
    }

    pub fn contains_with_level_or_higher(&self, level: Level) -> bool {
        self.by_level.range(level..).any(|(_, r)| !r.is_empty())
    }

    /// Whether any finding of the given kind was recorded
    pub fn contains_code(&self, code: &str) -> bool {
        self.iter().any(|r| r.code() == code)
    }

    /// Copy of this collection with `prefix` prepended to every position
    pub fn prefix_with_xpath(&self, prefix: &str) -> Reasons {
        let mut prefixed = Reasons::new();
        for reason in self.iter() {
            prefixed.add(reason.prefix_with_xpath(prefix));
        }
        prefixed
    }

    /// Only the findings at or above `level`
    pub fn filter_level_or_higher(&self, level: Level) -> Reasons {
        let mut filtered = Reasons::new();
        for reason in self.get_with_level_or_higher(level) {
            filtered.add(reason.clone());
        }
        filtered
    }

    /// Fail with [`CapError::Invalid`] when anything at or above `level` was recorded
    pub fn into_result(self, level: Level) -> crate::Result<Reasons> {
        if self.contains_with_level_or_higher(level) {
            Err(CapError::Invalid(self.filter_level_or_higher(level)))
        } else {
            Ok(self)
        }
    }
}

impl IntoIterator for Reasons {
    type Item = Reason;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::IntoValues<Level, Vec<Reason>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_level.into_values().flatten()
    }
}

impl<'a> IntoIterator for &'a Reasons {
    type Item = &'a Reason;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::Values<'a, Level, Vec<Reason>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_level.values().flatten()
    }
}

impl fmt::Display for Reasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}
