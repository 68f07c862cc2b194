//! ABOUTME: Fluent builders for constructing CAP alerts in code
//! ABOUTME: Generated identifiers are ULIDs; timestamps are written in CAP dateTime form

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cap_core::Id;
use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::dates::format_cap_date;
use crate::model::{
    Alert, Area, Category, Certainty, Circle, Group, Info, MsgType, Point, Polygon, Resource,
    ResponseType, Scope, Severity, Status, Urgency, ValuePair, Version,
};

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Builder for CAP Alert messages
pub struct AlertBuilder {
    alert: Alert,
}

impl AlertBuilder {
    /// Create a CAP 1.2 Actual/Alert/Public alert sent now, with a generated identifier
    pub fn new(sender: impl Into<String>) -> Self {
        let mut alert = Alert::new(Version::V1_2);
        alert.identifier = Some(Id::new().to_string());
        alert.sender = Some(sender.into());
        alert.sent = Some(format_cap_date(&now()));
        alert.status = Some(Status::Actual);
        alert.msg_type = Some(MsgType::Alert);
        alert.scope = Some(Scope::Public);
        Self { alert }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.alert.version = version;
        self
    }

    /// Set a custom identifier (defaults to generated ULID)
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.alert.identifier = Some(identifier.into());
        self
    }

    pub fn sent(mut self, sent: DateTime<FixedOffset>) -> Self {
        self.alert.sent = Some(format_cap_date(&sent));
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.alert.status = Some(status);
        self
    }

    pub fn msg_type(mut self, msg_type: MsgType) -> Self {
        self.alert.msg_type = Some(msg_type);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.alert.scope = Some(scope);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.alert.source = Some(source.into());
        self
    }

    /// Set restriction (required when scope is Restricted)
    pub fn restriction(mut self, restriction: impl Into<String>) -> Self {
        self.alert.restriction = Some(restriction.into());
        self
    }

    /// Set addresses (required when scope is Private)
    pub fn addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alert.addresses = Some(Group::new(addresses));
        self
    }

    /// Add a handling code
    pub fn add_code(mut self, code: impl Into<String>) -> Self {
        self.alert.code.push(code.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.alert.note = Some(note.into());
        self
    }

    /// Reference an earlier alert as a `sender,identifier,sent` triplet
    pub fn add_reference(
        mut self,
        sender: impl AsRef<str>,
        identifier: impl AsRef<str>,
        sent: DateTime<FixedOffset>,
    ) -> Self {
        let reference = format!(
            "{},{},{}",
            sender.as_ref(),
            identifier.as_ref(),
            format_cap_date(&sent)
        );
        self.alert
            .references
            .get_or_insert_with(Group::default)
            .value
            .push(reference);
        self
    }

    pub fn add_incident(mut self, incident: impl Into<String>) -> Self {
        self.alert
            .incidents
            .get_or_insert_with(Group::default)
            .value
            .push(incident.into());
        self
    }

    /// Add an Info block using an InfoBuilder
    pub fn add_info<F>(mut self, f: F) -> Self
    where
        F: FnOnce(InfoBuilder) -> InfoBuilder,
    {
        let info = f(InfoBuilder::new()).build();
        self.alert.info.push(info);
        self
    }

    pub fn build(self) -> Alert {
        self.alert
    }
}

/// Builder for CAP Info blocks
pub struct InfoBuilder {
    info: Info,
}

impl InfoBuilder {
    /// Start from an "Unknown Event" with Unknown urgency, severity and certainty
    pub fn new() -> Self {
        Self {
            info: Info {
                event: Some("Unknown Event".to_string()),
                urgency: Some(Urgency::Unknown),
                severity: Some(Severity::Unknown),
                certainty: Some(Certainty::Unknown),
                ..Info::default()
            },
        }
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.info.event = Some(event.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.info.language = Some(language.into());
        self
    }

    /// Add a category; duplicates are ignored
    pub fn add_category(mut self, category: Category) -> Self {
        if !self.info.category.contains(&category) {
            self.info.category.push(category);
        }
        self
    }

    pub fn add_response_type(mut self, response_type: ResponseType) -> Self {
        if !self.info.response_type.contains(&response_type) {
            self.info.response_type.push(response_type);
        }
        self
    }

    pub fn urgency(mut self, urgency: Urgency) -> Self {
        self.info.urgency = Some(urgency);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.info.severity = Some(severity);
        self
    }

    pub fn certainty(mut self, certainty: Certainty) -> Self {
        self.info.certainty = Some(certainty);
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.info.audience = Some(audience.into());
        self
    }

    pub fn add_event_code(mut self, value_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.event_code.push(ValuePair::new(value_name, value));
        self
    }

    pub fn effective(mut self, effective: DateTime<FixedOffset>) -> Self {
        self.info.effective = Some(format_cap_date(&effective));
        self
    }

    /// Set effective time to now
    pub fn effective_now(mut self) -> Self {
        self.info.effective = Some(format_cap_date(&now()));
        self
    }

    pub fn onset(mut self, onset: DateTime<FixedOffset>) -> Self {
        self.info.onset = Some(format_cap_date(&onset));
        self
    }

    pub fn expires(mut self, expires: DateTime<FixedOffset>) -> Self {
        self.info.expires = Some(format_cap_date(&expires));
        self
    }

    /// Set expires time relative to now
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.info.expires = Some(format_cap_date(&(now() + duration)));
        self
    }

    pub fn sender_name(mut self, sender_name: impl Into<String>) -> Self {
        self.info.sender_name = Some(sender_name.into());
        self
    }

    pub fn headline(mut self, headline: impl Into<String>) -> Self {
        self.info.headline = Some(headline.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.info.instruction = Some(instruction.into());
        self
    }

    pub fn web(mut self, web: impl Into<String>) -> Self {
        self.info.web = Some(web.into());
        self
    }

    pub fn contact(mut self, contact: impl Into<String>) -> Self {
        self.info.contact = Some(contact.into());
        self
    }

    pub fn add_parameter(mut self, value_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.parameter.push(ValuePair::new(value_name, value));
        self
    }

    pub fn add_resource<F>(mut self, resource_desc: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(ResourceBuilder) -> ResourceBuilder,
    {
        let resource = f(ResourceBuilder::new(resource_desc)).build();
        self.info.resource.push(resource);
        self
    }

    pub fn add_area<F>(mut self, area_desc: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(AreaBuilder) -> AreaBuilder,
    {
        let area = f(AreaBuilder::new(area_desc)).build();
        self.info.area.push(area);
        self
    }

    /// Build the Info block; falls back to category Other when none was added
    pub fn build(mut self) -> Info {
        if self.info.category.is_empty() {
            self.info.category.push(Category::Other);
        }
        self.info
    }
}

impl Default for InfoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for CAP Resource blocks
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    pub fn new(resource_desc: impl Into<String>) -> Self {
        Self {
            resource: Resource {
                resource_desc: Some(resource_desc.into()),
                ..Resource::default()
            },
        }
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.resource.mime_type = Some(mime_type.into());
        self
    }

    /// Size in bytes
    pub fn size(mut self, size: i64) -> Self {
        self.resource.size = Some(size);
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.resource.uri = Some(uri.into());
        self
    }

    /// Embed the resource content, base64 encoded
    pub fn deref_uri(mut self, content: impl AsRef<[u8]>) -> Self {
        self.resource.deref_uri = Some(STANDARD.encode(content));
        self
    }

    /// SHA-1 digest of the resource, hex encoded
    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.resource.digest = Some(digest.into());
        self
    }

    pub fn build(self) -> Resource {
        self.resource
    }
}

/// Builder for CAP Area blocks
pub struct AreaBuilder {
    area: Area,
}

impl AreaBuilder {
    pub fn new(area_desc: impl Into<String>) -> Self {
        Self {
            area: Area {
                area_desc: Some(area_desc.into()),
                ..Area::default()
            },
        }
    }

    /// Add a polygon from (latitude, longitude) pairs; the ring is closed if it is not already
    pub fn add_polygon<I>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut polygon = Polygon {
            point: points
                .into_iter()
                .map(|(latitude, longitude)| Point::new(latitude, longitude))
                .collect(),
        };
        if !polygon.is_closed() {
            if let Some(first) = polygon.point.first().copied() {
                polygon.point.push(first);
            }
        }
        self.area.polygon.push(polygon);
        self
    }

    /// Add a circle; radius in kilometers
    pub fn add_circle(mut self, latitude: f64, longitude: f64, radius: f64) -> Self {
        self.area.circle.push(Circle {
            point: Point::new(latitude, longitude),
            radius,
        });
        self
    }

    pub fn add_geocode(mut self, value_name: impl Into<String>, value: impl Into<String>) -> Self {
        self.area.geocode.push(ValuePair::new(value_name, value));
        self
    }

    pub fn altitude(mut self, altitude: f64) -> Self {
        self.area.altitude = Some(altitude);
        self
    }

    pub fn ceiling(mut self, ceiling: f64) -> Self {
        self.area.ceiling = Some(ceiling);
        self
    }

    pub fn build(self) -> Area {
        self.area
    }
}
