//! ABOUTME: Core errors, IDs, and tracing utilities
//! ABOUTME: Foundation crate used by all other capkit components

pub mod error;
pub mod id;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use id::Id;
pub use time::MonotonicTimer;

#[cfg(test)]
mod tests {
    use test_support::fixture;

    #[test]
    fn test_cross_crate_usage() {
        let xml = fixture("cap12_minimal.xml");
        assert!(xml.contains("urn:oasis:names:tc:emergency:cap:1.2"));
    }
}
