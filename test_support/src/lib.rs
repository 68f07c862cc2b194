//! ABOUTME: Shared testing utilities and CAP fixture documents
//! ABOUTME: Common test fixtures for all crates

/// Sample CAP documents, one per protocol version plus a few edge cases
const FIXTURES: &[(&str, &str)] = &[
    ("cap10_legacy.xml", include_str!("../fixtures/cap10_legacy.xml")),
    ("cap11_draft.xml", include_str!("../fixtures/cap11_draft.xml")),
    ("cap12_full.xml", include_str!("../fixtures/cap12_full.xml")),
    ("cap12_minimal.xml", include_str!("../fixtures/cap12_minimal.xml")),
    ("not_cap.xml", include_str!("../fixtures/not_cap.xml")),
    ("signed_alert.xml", include_str!("../fixtures/signed_alert.xml")),
];

/// Look up a fixture document by file name.
///
/// Panics on an unknown name; this is only ever called from tests.
pub fn fixture(name: &str) -> &'static str {
    FIXTURES
        .iter()
        .find(|(fixture_name, _)| *fixture_name == name)
        .map(|(_, xml)| *xml)
        .unwrap_or_else(|| panic!("unknown fixture: {name}"))
}

/// All fixture names that hold well-formed CAP alerts
pub fn cap_fixture_names() -> impl Iterator<Item = &'static str> {
    FIXTURES
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| name.starts_with("cap") || name.starts_with("signed"))
}

/// A minimal CAP 1.2 alert with the given `<info>` body spliced in.
pub fn alert_with_info(info_body: &str) -> String {
    wrap_alert(
        "urn:oasis:names:tc:emergency:cap:1.2",
        &format!("<info>{info_body}</info>"),
    )
}

/// Wrap alert-level header elements and `body` in an `<alert>` for the given namespace.
pub fn wrap_alert(xmlns: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <alert xmlns=\"{xmlns}\">\
         <identifier>test-1</identifier>\
         <sender>test@example.org</sender>\
         <sent>2011-05-24T16:49:00-07:00</sent>\
         <status>Test</status>\
         <msgType>Alert</msgType>\
         <scope>Public</scope>\
         {body}\
         </alert>"
    )
}
