//! ABOUTME: End-to-end tests for the CAP pipeline across parser, validator and serializers
//! ABOUTME: Exercises round-trips, version gating, geometry, references and the HTML sweep

use cap_alert::{
    AlertBuilder, CapError, CapJsonBuilder, CapXmlBuilder, CapXmlParser, Group, Level, Reasons,
    Version,
};
use chrono::{DateTime, Duration};
use pretty_assertions::assert_eq;
use test_support::{alert_with_info, cap_fixture_names, fixture, wrap_alert};

fn parse_with_reasons(xml: &str) -> (cap_alert::Alert, Reasons) {
    let mut reasons = Reasons::new();
    let alert = CapXmlParser::new(false)
        .parse_str_with_reasons(xml, &mut reasons)
        .expect("document should parse");
    (alert, reasons)
}

fn codes_at(reasons: &Reasons, code: &str) -> Vec<String> {
    reasons
        .iter()
        .filter(|reason| reason.code() == code)
        .map(|reason| reason.xpath().to_string())
        .collect()
}

#[test]
fn test_fixtures_round_trip_through_xml() {
    for name in cap_fixture_names() {
        let (alert, _) = parse_with_reasons(fixture(name));
        for indent in [0, 2] {
            let xml = CapXmlBuilder::new().with_indent(indent).to_xml(&alert).unwrap();
            let (reparsed, _) = parse_with_reasons(&xml);
            assert_eq!(reparsed, alert, "{name} with indent {indent}");
        }
    }
}

#[test]
fn test_built_alert_round_trips() {
    let alert = AlertBuilder::new("ops@example.org")
        .addresses(["hello world", "plain"])
        .add_info(|info| {
            info.event("Flood")
                .description("Water \"rising\" & <spreading>")
                .add_parameter("key", "a=b")
                .add_area("Valley", |area| {
                    area.add_polygon([(1.5, 2.25), (3.0, 4.0), (5.0, 6.0)])
                        .add_circle(-33.25, 151.125, 12.5)
                })
        })
        .build();
    let xml = CapXmlBuilder::new().to_xml(&alert).unwrap();
    assert!(xml.contains("<addresses>&quot;hello world&quot; plain</addresses>"));
    let (reparsed, _) = parse_with_reasons(&xml);
    assert_eq!(reparsed, alert);
}

#[test]
fn test_quoted_group_values_reparse_in_order() {
    let mut alert = AlertBuilder::new("ops@example.org").build();
    alert.incidents = Some(Group::new(["hello world", "plain"]));
    let xml = CapXmlBuilder::new().to_xml(&alert).unwrap();
    let (reparsed, _) = parse_with_reasons(&xml);
    assert_eq!(
        reparsed.incidents.unwrap().value,
        vec!["hello world".to_string(), "plain".to_string()]
    );
}

#[test]
fn test_valid_fixtures_have_no_errors() {
    for name in ["cap12_full.xml", "cap12_minimal.xml", "cap11_draft.xml", "signed_alert.xml"] {
        let (_, reasons) = parse_with_reasons(fixture(name));
        assert!(
            !reasons.contains_with_level_or_higher(Level::Error),
            "{name}: {reasons}"
        );
    }
}

#[test]
fn test_validating_parser_accepts_clean_document() {
    let alert = CapXmlParser::default()
        .parse_str(fixture("cap12_full.xml"))
        .unwrap();
    assert_eq!(alert.info.len(), 2);
    assert_eq!(alert.identifier.as_deref(), Some("43b080713727"));
}

#[test]
fn test_non_cap_and_malformed_input_fail_fast() {
    let parser = CapXmlParser::new(false);
    assert!(matches!(
        parser.parse_str(fixture("not_cap.xml")),
        Err(CapError::NotCap(_))
    ));
    assert!(matches!(
        parser.parse_str("<alert xmlns=\"urn:oasis:names:tc:emergency:cap:1.2\"><identifier>"),
        Err(CapError::Syntax { .. })
    ));
}

#[test]
fn test_category_is_required_from_cap11() {
    let body = "<info><event>e</event><urgency>Past</urgency>\
                <severity>Minor</severity><certainty>Likely</certainty></info>";
    let cap10 = wrap_alert(Version::CAP10_XMLNS, body).replace("<scope>Public</scope>", "");
    let (_, reasons) = parse_with_reasons(&cap10);
    assert!(!reasons.contains_with_level_or_higher(Level::Error), "{reasons}");

    for xmlns in [Version::CAP11_XMLNS, Version::CAP12_XMLNS] {
        let (_, reasons) = parse_with_reasons(&wrap_alert(xmlns, body));
        assert_eq!(
            codes_at(&reasons, "MISSING_REQUIRED_ELEMENT"),
            vec!["/alert[1]/info[1]".to_string()]
        );
    }
}

#[test]
fn test_scope_is_required_from_cap11() {
    let body = "<info><category>Met</category><event>e</event><urgency>Past</urgency>\
                <severity>Minor</severity><certainty>Likely</certainty></info>";
    let cap10 = wrap_alert(Version::CAP10_XMLNS, body).replace("<scope>Public</scope>", "");
    let (alert, reasons) = parse_with_reasons(&cap10);
    assert_eq!(alert.scope, None);
    assert!(!reasons.contains_with_level_or_higher(Level::Error), "{reasons}");

    for xmlns in [Version::CAP11_XMLNS, Version::CAP12_XMLNS] {
        let xml = wrap_alert(xmlns, body).replace("<scope>Public</scope>", "");
        let (_, reasons) = parse_with_reasons(&xml);
        let missing: Vec<&str> = reasons
            .iter()
            .filter(|r| r.code() == "MISSING_REQUIRED_ELEMENT")
            .map(|r| r.params()[0].as_str())
            .collect();
        assert_eq!(missing, vec!["scope"]);
    }
}

fn area_with(geometry: &str) -> String {
    alert_with_info(&format!(
        "<category>Geo</category><event>e</event><urgency>Past</urgency>\
         <severity>Minor</severity><certainty>Likely</certainty>\
         <area><areaDesc>here</areaDesc>{geometry}</area>"
    ))
}

#[test]
fn test_closed_polygon_is_accepted() {
    let (alert, reasons) = parse_with_reasons(&area_with("<polygon>1,2 3,4 5,6 1,2</polygon>"));
    let polygon = &alert.info[0].area[0].polygon[0];
    assert_eq!(polygon.point.len(), 4);
    assert!(polygon.is_closed());
    assert!(!reasons.contains_with_level_or_higher(Level::Error), "{reasons}");
}

#[test]
fn test_short_polygon_parses_but_fails_point_count() {
    let (alert, reasons) = parse_with_reasons(&area_with("<polygon>1,2 3,4 1,2</polygon>"));
    assert_eq!(alert.info[0].area[0].polygon[0].point.len(), 3);
    assert!(!reasons.contains_code("INVALID_POLYGON"));
    assert_eq!(
        codes_at(&reasons, "INVALID_POLYGON_POINT_COUNT"),
        vec!["/alert[1]/info[1]/area[1]/polygon[1]".to_string()]
    );
}

#[test]
fn test_open_polygon_fails_closure() {
    let (_, reasons) = parse_with_reasons(&area_with("<polygon>1,2 3,4 5,6 7,8</polygon>"));
    assert!(reasons.contains_code("INVALID_POLYGON_CLOSURE"));
    assert!(!reasons.contains_code("INVALID_POLYGON_POINT_COUNT"));
}

#[test]
fn test_out_of_range_circle() {
    let (_, reasons) = parse_with_reasons(&area_with("<circle>91,181 -1</circle>"));
    assert!(reasons.contains_code("INVALID_LATITUDE"));
    assert!(reasons.contains_code("INVALID_LONGITUDE"));
    assert!(reasons.contains_code("INVALID_CIRCLE_RADIUS"));
}

fn with_reference(identifier: &str, reference: &str) -> String {
    wrap_alert(
        Version::CAP12_XMLNS,
        &format!("<references>{reference}</references>"),
    )
    .replace("<identifier>test-1</identifier>", &format!("<identifier>{identifier}</identifier>"))
}

#[test]
fn test_reference_rules() {
    let sent = DateTime::parse_from_rfc3339("2011-05-24T16:49:00-07:00").unwrap();
    let day_before = cap_alert::dates::format_cap_date(&(sent - Duration::days(1)));
    let day_after = cap_alert::dates::format_cap_date(&(sent + Duration::days(1)));

    let (_, circular) = parse_with_reasons(&with_reference("X", &format!("sender,X,{day_before}")));
    assert!(circular.contains_code("CIRCULAR_REFERENCE"));

    let (_, postdated) = parse_with_reasons(&with_reference("X", &format!("sender,Y,{day_after}")));
    assert!(postdated.contains_code("POSTDATED_REFERENCE"));
    assert!(!postdated.contains_code("CIRCULAR_REFERENCE"));

    let (_, clean) = parse_with_reasons(&with_reference("X", &format!("sender,Y,{day_before}")));
    assert!(!clean.contains_code("POSTDATED_REFERENCE"));
    assert!(!clean.contains_code("CIRCULAR_REFERENCE"));
    assert!(!clean.contains_code("INVALID_REFERENCES"));
}

#[test]
fn test_html_sweep_reaches_any_text_field() {
    let xml = alert_with_info(
        "<category>Met</category><event>e</event><urgency>Past</urgency>\
         <severity>Minor</severity><certainty>Likely</certainty>\
         <audience>a &amp;amp; b</audience><contact>&lt;b&gt;x&lt;/b&gt;</contact>\
         <area><areaDesc>a &amp;amp; b</areaDesc></area>",
    );
    let (alert, reasons) = parse_with_reasons(&xml);
    assert_eq!(alert.info[0].audience.as_deref(), Some("a &amp; b"));
    assert_eq!(
        codes_at(&reasons, "TEXT_CONTAINS_HTML_ENTITIES"),
        vec![
            "/alert[1]/info[1]/audience[1]".to_string(),
            "/alert[1]/info[1]/area[1]/areaDesc[1]".to_string(),
        ]
    );
    assert_eq!(
        codes_at(&reasons, "TEXT_CONTAINS_HTML_TAGS"),
        vec!["/alert[1]/info[1]/contact[1]".to_string()]
    );
}

#[test]
fn test_positions_distinguish_siblings() {
    let info = "<info><language>en_US</language><category>Met</category><event>e</event>\
                <urgency>Past</urgency><severity>Minor</severity><certainty>Likely</certainty></info>";
    let xml = wrap_alert(Version::CAP12_XMLNS, &info.repeat(3));
    let (_, reasons) = parse_with_reasons(&xml);
    assert_eq!(
        codes_at(&reasons, "INVALID_LANGUAGE"),
        vec![
            "/alert[1]/info[1]/language[1]".to_string(),
            "/alert[1]/info[2]/language[1]".to_string(),
            "/alert[1]/info[3]/language[1]".to_string(),
        ]
    );
}

#[test]
fn test_level_or_higher_is_union_of_levels() {
    let (_, reasons) = parse_with_reasons(fixture("cap10_legacy.xml"));
    let mut with_html = reasons.clone();
    with_html.extend(parse_with_reasons(&area_with("<polygon>1,2 3,4 1,2</polygon>")).1);
    for level in Level::ALL {
        let or_higher = with_html.get_with_level_or_higher(level);
        let mut expected = with_html.get_with_level(level);
        for higher in level.higher_levels() {
            expected.extend(with_html.get_with_level(higher));
        }
        assert_eq!(or_higher.len(), expected.len());
        for reason in expected {
            assert!(or_higher.contains(&reason));
        }
        for higher in level.higher_levels() {
            assert!(with_html.get_with_level_or_higher(higher).len() <= or_higher.len());
        }
    }
}

#[test]
fn test_json_projection_of_fixture() {
    let (alert, _) = parse_with_reasons(fixture("cap12_full.xml"));
    let value = CapJsonBuilder::new().to_value(&alert);
    assert_eq!(value["addresses"], "\"address 1\" address2");
    assert_eq!(value["code"], serde_json::json!(["abcde", "fghij"]));
    assert!(value["info"].is_array());
    assert_eq!(value["info"][1]["language"], "fr-CA");
    assert_eq!(value["info"][0]["area"][0]["polygon"], serde_json::json!(["1,2 3,4 5,6 1,2"]));
    assert_eq!(value["info"][0]["resource"][0]["size"], "123");
    assert!(value.get("alert").is_none());
}

#[test]
fn test_strict_schema_reports_only_schema_findings() {
    let xml = area_with("<polygon>1,2 3,4 1,2</polygon>");
    let mut reasons = Reasons::new();
    CapXmlParser::new(false)
        .with_strict_schema(true)
        .parse_str_with_reasons(&xml, &mut reasons)
        .unwrap();
    assert!(!reasons.contains_code("INVALID_POLYGON_POINT_COUNT"));
}

#[test]
fn test_validate_flag_escalates_errors() {
    let xml = area_with("<polygon>1,2 3,4 5,6 7,8</polygon>");
    match CapXmlParser::new(true).parse_str(&xml) {
        Err(CapError::Invalid(reasons)) => {
            assert!(reasons.contains_code("INVALID_POLYGON_CLOSURE"));
            assert!(!reasons.contains_with_level(Level::Warning));
        }
        other => panic!("expected invalid alert, got {other:?}"),
    }
}
