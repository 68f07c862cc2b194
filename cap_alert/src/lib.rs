//! ABOUTME: Common Alerting Protocol 1.0/1.1/1.2 parsing, validation and serialization
//! ABOUTME: Findings are collected as positioned Reasons; callers decide when to fail

use thiserror::Error;

pub mod builder;
pub mod composite;
pub mod dates;
pub mod descriptor;
pub mod input;
pub mod json;
pub mod model;
pub mod parser;
pub mod reasons;
pub mod reflect;
pub mod schema;
pub mod ser;
pub mod validator;
pub mod xpath;

pub use builder::{AlertBuilder, AreaBuilder, InfoBuilder, ResourceBuilder};
pub use input::CachedInput;
pub use json::CapJsonBuilder;
pub use model::{
    Alert, Area, CapEnum, Category, Certainty, Circle, Group, Info, MsgType, Point, Polygon,
    Resource, ResponseType, Scope, Severity, Status, Urgency, ValuePair, Version,
};
pub use parser::{detect_version, CapXmlParser};
pub use reasons::{Level, Reason, ReasonKind, ReasonType, Reasons};
pub use schema::{ElementSchema, SchemaValidator};
pub use ser::CapXmlBuilder;
pub use validator::CapValidator;
pub use xpath::XPath;

/// Result type for CAP operations
pub type Result<T> = std::result::Result<T, CapError>;

/// Errors that stop processing of a document
///
/// Per-field problems are not errors: they are recorded as [`Reason`]s and only
/// surface here, as [`CapError::Invalid`], when the caller asks to fail on them.
#[derive(Error, Debug)]
pub enum CapError {
    #[error("Not a CAP document: {0}")]
    NotCap(String),
    #[error("Malformed XML at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("Invalid CAP alert: {0}")]
    Invalid(Reasons),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CapError {
    /// Findings carried by an [`CapError::Invalid`]
    pub fn reasons(&self) -> Option<&Reasons> {
        match self {
            CapError::Invalid(reasons) => Some(reasons),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_error_renders_findings() {
        let mut reasons = Reasons::new();
        reasons.push("/alert[1]", &ReasonType::MissingRequiredElement, ["sender"]);
        let err = reasons.into_result(Level::Error).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid CAP alert: [/alert[1]]"));
        assert!(message.contains("sender"));
        assert_eq!(err.reasons().map(Reasons::len), Some(1));
    }

    #[test]
    fn test_syntax_error_display() {
        let err = CapError::Syntax {
            line: 3,
            column: 7,
            message: "unexpected end".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed XML at line 3, column 7: unexpected end"
        );
        assert!(err.reasons().is_none());
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CapError = io.into();
        assert!(matches!(err, CapError::Io(_)));
    }
}
