//! ABOUTME: Semantic CAP validation layered on top of parsing
//! ABOUTME: Version-aware structural rules plus a metadata-driven sweep of every text field

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::dates::parse_cap_date;
use crate::descriptor::{required_fields, EntityKind, FieldKind};
use crate::model::{
    Alert, Area, Certainty, Circle, Info, Point, Polygon, Resource, Scope, ValuePair, Version,
};
use crate::reasons::{ReasonType, Reasons};
use crate::reflect::{Entity, EntityRef, FieldValue};
use crate::xpath::XPath;

const MIME_TOP_LEVEL_TYPES: &[&str] = &[
    "application",
    "audio",
    "image",
    "message",
    "model",
    "multipart",
    "text",
    "video",
];

/// Language assumed for an `<info>` without `<language>`
const DEFAULT_LANGUAGE: &str = "en-US";

/// Human-readable fields compared across languages for untranslated copies
const TRANSLATED_FIELDS: &[&str] = &["description", "headline", "instruction", "event"];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("validator pattern must compile"))
}

fn language_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$")
}

fn illegal_identifier_chars() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"[\s,&<]")
}

fn html_tag_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"<([^\s>]+)(.*?)>")
}

fn html_entity_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    regex(&CELL, r"&(#\d+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]{1,31});")
}

/// Check language tag format (relaxed RFC 3066)
pub fn is_valid_language_code(language: &str) -> bool {
    language_pattern().is_match(language.trim())
}

/// Identifiers and senders must not contain whitespace, commas, `<` or `&`
pub fn is_valid_identifier(value: &str) -> bool {
    !illegal_identifier_chars().is_match(value)
}

/// `type/subtype` with a registered top-level type
pub fn is_valid_mime_type(mime_type: &str) -> bool {
    match mime_type.trim().split_once('/') {
        Some((top, subtype)) => {
            MIME_TOP_LEVEL_TYPES.contains(&top.to_ascii_lowercase().as_str())
                && !subtype.trim().is_empty()
        }
        None => false,
    }
}

pub fn is_valid_deref_uri(data: &str) -> bool {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).is_ok()
}

pub fn contains_html_tags(text: &str) -> bool {
    html_tag_pattern().is_match(text)
}

pub fn contains_html_entities(text: &str) -> bool {
    html_entity_pattern().is_match(text)
}

/// Semantic validator for parsed alerts
///
/// Never fails: every finding is returned as a [`Reasons`] entry and the alert is
/// left untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapValidator;

impl CapValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, alert: &Alert) -> Reasons {
        let mut run = Run {
            version: alert.version,
            xpath: XPath::new(),
            reasons: Reasons::new(),
        };
        run.xpath.push("alert");
        run.check_alert(alert);
        run.xpath.pop();

        let mut sweep_xpath = XPath::new();
        sweep_xpath.push("alert");
        sweep_text_fields(alert.entity_ref(), &mut sweep_xpath, &mut run.reasons);

        debug!(
            identifier = alert.identifier.as_deref().unwrap_or(""),
            findings = run.reasons.len(),
            "Validated alert"
        );
        run.reasons
    }
}

struct Run {
    version: Version,
    xpath: XPath,
    reasons: Reasons,
}

impl Run {
    fn here(&self) -> String {
        self.xpath.path()
    }

    fn check_required(&mut self, entity: EntityRef<'_>) {
        for name in required_fields(entity.kind(), self.version) {
            let Some((_, field)) = entity.kind().field(name) else {
                continue;
            };
            let present = entity
                .values(field)
                .iter()
                .any(|value| !matches!(value, FieldValue::Str("")));
            if !present {
                self.reasons
                    .push(self.here(), &ReasonType::MissingRequiredElement, [name]);
            }
        }
    }

    fn check_date(&mut self, name: &str, value: Option<&str>) {
        if let Some(text) = value {
            if parse_cap_date(text).is_none() {
                self.reasons
                    .push(self.xpath.child(name), &ReasonType::InvalidDate, [name, text]);
            }
        }
    }

    fn check_alert(&mut self, alert: &Alert) {
        self.check_required(alert.entity_ref());

        if let Some(identifier) = &alert.identifier {
            if !is_valid_identifier(identifier) {
                self.reasons.push(
                    self.xpath.child("identifier"),
                    &ReasonType::InvalidIdentifier,
                    [identifier],
                );
            }
        }
        if let Some(sender) = &alert.sender {
            if !is_valid_identifier(sender) {
                self.reasons.push(
                    self.xpath.child("sender"),
                    &ReasonType::InvalidSender,
                    [sender],
                );
            }
        }
        if alert.password.is_some() && self.version > Version::V1_0 {
            self.reasons.push_plain(
                self.xpath.child("password"),
                &ReasonType::PasswordDeprecated,
            );
        }
        self.check_date("sent", alert.sent.as_deref());

        if alert.restriction.is_some() && alert.scope != Some(Scope::Restricted) {
            self.reasons.push_plain(
                self.xpath.child("restriction"),
                &ReasonType::RestrictionScopeMismatch,
            );
        }
        if alert.addresses.is_some() && alert.scope != Some(Scope::Private) {
            self.reasons.push_plain(
                self.xpath.child("addresses"),
                &ReasonType::AddressesScopeMismatch,
            );
        }
        if let Some(references) = &alert.references {
            for reference in &references.value {
                self.check_reference(alert, reference);
            }
        }

        let mut translations: HashMap<(&'static str, &str), &str> = HashMap::new();
        let mut inconsistent_categories = false;
        let mut inconsistent_event_codes = false;
        let first = alert.info.first();

        for (i, info) in alert.info.iter().enumerate() {
            self.xpath.push("info");
            self.check_info(info);
            self.check_translations(info, &mut translations);

            if let (Some(first), true) = (first, i > 0) {
                let categories = |info: &Info| info.category.iter().copied().collect::<HashSet<_>>();
                if !inconsistent_categories && categories(first) != categories(info) {
                    inconsistent_categories = true;
                    self.reasons
                        .push_plain(self.here(), &ReasonType::InconsistentCategories);
                }
                let codes = |info: &Info| info.event_code.iter().cloned().collect::<HashSet<ValuePair>>();
                if !inconsistent_event_codes && codes(first) != codes(info) {
                    inconsistent_event_codes = true;
                    self.reasons
                        .push_plain(self.here(), &ReasonType::InconsistentEventCodes);
                }
            }
            self.xpath.pop();
        }
    }

    fn check_reference(&mut self, alert: &Alert, reference: &str) {
        let position = self.xpath.child("references");
        let own_identifier = alert.identifier.as_deref().unwrap_or_default();

        if self.version == Version::V1_0 {
            let identifier = reference.split('/').next().unwrap_or_default();
            if identifier == own_identifier {
                self.reasons
                    .push(position, &ReasonType::CircularReference, [reference]);
            }
            return;
        }

        let parts: Vec<&str> = reference.splitn(3, ',').collect();
        let [_, identifier, sent] = parts.as_slice() else {
            self.reasons
                .push(position, &ReasonType::InvalidReferences, [reference]);
            return;
        };
        if *identifier == own_identifier {
            self.reasons
                .push(position.clone(), &ReasonType::CircularReference, [reference]);
        }
        match (parse_cap_date(sent), alert.sent_time()) {
            (None, _) => self
                .reasons
                .push(position, &ReasonType::InvalidReferences, [reference]),
            (Some(referenced), Some(own)) if referenced > own => self
                .reasons
                .push(position, &ReasonType::PostdatedReference, [reference]),
            _ => {}
        }
    }

    fn check_translations<'a>(
        &mut self,
        info: &'a Info,
        seen: &mut HashMap<(&'static str, &'a str), &'a str>,
    ) {
        let language = info.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        for name in TRANSLATED_FIELDS {
            let text = match *name {
                "description" => info.description.as_deref(),
                "headline" => info.headline.as_deref(),
                "instruction" => info.instruction.as_deref(),
                _ => info.event.as_deref(),
            };
            let Some(text) = text else { continue };
            match seen.get(&(*name, text)) {
                Some(other) if *other != language => {
                    let other = other.to_string();
                    self.reasons.push(
                        self.xpath.child(name),
                        &ReasonType::SameTextDifferentLanguage,
                        [name.to_string(), other, language.to_string()],
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert((*name, text), language);
                }
            }
        }
    }

    fn check_info(&mut self, info: &Info) {
        self.check_required(info.entity_ref());

        if let Some(language) = &info.language {
            if !is_valid_language_code(language) {
                self.reasons.push(
                    self.xpath.child("language"),
                    &ReasonType::InvalidLanguage,
                    [language],
                );
            }
        }
        if info.certainty == Some(Certainty::VeryLikely) && self.version > Version::V1_0 {
            self.reasons.push_plain(
                self.xpath.child("certainty"),
                &ReasonType::CertaintyVeryLikelyDeprecated,
            );
        }
        self.check_date("effective", info.effective.as_deref());
        self.check_date("onset", info.onset.as_deref());
        self.check_date("expires", info.expires.as_deref());

        if let Some(web) = &info.web {
            if Url::parse(web.trim()).is_err() {
                self.reasons
                    .push(self.xpath.child("web"), &ReasonType::InvalidWeb, [web]);
            }
        }

        self.check_value_pairs("eventCode", &info.event_code);
        self.check_value_pairs("parameter", &info.parameter);

        for resource in &info.resource {
            self.xpath.push("resource");
            self.check_resource(resource);
            self.xpath.pop();
        }
        for area in &info.area {
            self.xpath.push("area");
            self.check_area(area);
            self.xpath.pop();
        }
    }

    /// Value pairs are child elements from 1.1 on, each needing a name and a value
    fn check_value_pairs(&mut self, name: &str, pairs: &[ValuePair]) {
        if self.version == Version::V1_0 {
            return;
        }
        for pair in pairs {
            self.xpath.push(name);
            self.check_required(pair.entity_ref());
            self.xpath.pop();
        }
    }

    fn check_resource(&mut self, resource: &Resource) {
        self.check_required(resource.entity_ref());

        if let Some(mime_type) = &resource.mime_type {
            if !is_valid_mime_type(mime_type) {
                self.reasons.push(
                    self.xpath.child("mimeType"),
                    &ReasonType::InvalidMimeType,
                    [mime_type],
                );
            }
        }
        if let Some(size) = resource.size.filter(|size| *size < 0) {
            self.reasons.push(
                self.xpath.child("size"),
                &ReasonType::InvalidResourceSize,
                [size],
            );
        }
        if let Some(uri) = &resource.uri {
            self.check_uri(uri.trim(), resource.deref_uri.is_some());
        }
        if let Some(deref_uri) = &resource.deref_uri {
            if !is_valid_deref_uri(deref_uri) {
                self.reasons.push_plain(
                    self.xpath.child("derefUri"),
                    &ReasonType::InvalidDerefUri,
                );
            }
        }
    }

    fn check_uri(&mut self, uri: &str, has_deref_uri: bool) {
        let position = self.xpath.child("uri");
        match Url::parse(uri) {
            Ok(_) => {}
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let resolvable = Url::parse("http://relative.invalid/")
                    .and_then(|base| base.join(uri))
                    .is_ok();
                if !resolvable {
                    self.reasons.push(position, &ReasonType::InvalidUri, [uri]);
                } else if !has_deref_uri {
                    self.reasons
                        .push(position, &ReasonType::RelativeUriMissingDerefUri, [uri]);
                }
            }
            Err(_) => self.reasons.push(position, &ReasonType::InvalidUri, [uri]),
        }
    }

    fn check_area(&mut self, area: &Area) {
        self.check_required(area.entity_ref());

        for polygon in &area.polygon {
            self.xpath.push("polygon");
            self.check_polygon(polygon);
            self.xpath.pop();
        }
        for circle in &area.circle {
            self.xpath.push("circle");
            self.check_circle(circle);
            self.xpath.pop();
        }
        self.check_value_pairs("geocode", &area.geocode);

        match (area.altitude, area.ceiling) {
            (None, Some(_)) => self
                .reasons
                .push_plain(self.here(), &ReasonType::InvalidArea),
            (Some(altitude), Some(ceiling)) if altitude > ceiling => self.reasons.push_plain(
                self.xpath.child("ceiling"),
                &ReasonType::InvalidAltitudeCeilingRange,
            ),
            _ => {}
        }
    }

    fn check_polygon(&mut self, polygon: &Polygon) {
        if polygon.point.len() < 4 {
            self.reasons.push(
                self.here(),
                &ReasonType::InvalidPolygonPointCount,
                [polygon.point.len()],
            );
        }
        if !polygon.is_closed() {
            self.reasons
                .push_plain(self.here(), &ReasonType::InvalidPolygonClosure);
        }
        for point in &polygon.point {
            self.check_point(point);
        }
    }

    fn check_circle(&mut self, circle: &Circle) {
        self.check_point(&circle.point);
        if circle.radius < 0.0 {
            self.reasons.push(
                self.here(),
                &ReasonType::InvalidCircleRadius,
                [circle.radius],
            );
        }
    }

    fn check_point(&mut self, point: &Point) {
        if !(-90.0..=90.0).contains(&point.latitude) {
            self.reasons
                .push(self.here(), &ReasonType::InvalidLatitude, [point.latitude]);
        }
        if !(-180.0..=180.0).contains(&point.longitude) {
            self.reasons
                .push(self.here(), &ReasonType::InvalidLongitude, [point.longitude]);
        }
    }
}

/// Visit every text field reachable from `entity` and report HTML content at its own position
fn sweep_text_fields(entity: EntityRef<'_>, xpath: &mut XPath, reasons: &mut Reasons) {
    for field in entity.kind().fields() {
        for value in entity.values(field) {
            match (field.kind, value) {
                (FieldKind::Str, FieldValue::Str(text)) => {
                    xpath.push(field.name);
                    check_html(field.name, text, xpath, reasons);
                    xpath.pop();
                }
                (FieldKind::Entity(EntityKind::Group), FieldValue::Entity(EntityRef::Group(group))) => {
                    xpath.push(field.name);
                    for text in &group.value {
                        check_html(field.name, text, xpath, reasons);
                    }
                    xpath.pop();
                }
                (FieldKind::Entity(kind), FieldValue::Entity(child)) if !kind.is_text_composite() => {
                    xpath.push(field.name);
                    sweep_text_fields(child, xpath, reasons);
                    xpath.pop();
                }
                _ => {}
            }
        }
    }
}

fn check_html(name: &str, text: &str, xpath: &XPath, reasons: &mut Reasons) {
    if contains_html_entities(text) {
        reasons.push(xpath.path(), &ReasonType::TextContainsHtmlEntities, [name]);
    }
    if contains_html_tags(text) {
        reasons.push(xpath.path(), &ReasonType::TextContainsHtmlTags, [name]);
    }
}
