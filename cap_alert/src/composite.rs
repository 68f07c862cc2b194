//! ABOUTME: Text grammars for CAP composite fields (point, circle, polygon, group, 1.0 value pair)
//! ABOUTME: Hand-rolled single-pass tokenizers with matching formatters for the serializers

use crate::model::{Circle, Group, Point, Polygon, ValuePair};

/// Longest text echoed back in a diagnostic before it is cut with "..."
const MAX_ECHO_LEN: usize = 50;

/// Parse `lat,lng`
pub fn parse_point(text: &str) -> Option<Point> {
    let mut parts = text.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Point::new(latitude, longitude))
}

/// Parse `lat,lng radius`
pub fn parse_circle(text: &str) -> Option<Circle> {
    let mut tokens = text.split_whitespace();
    let point = parse_point(tokens.next()?)?;
    let radius = tokens.next()?.parse::<f64>().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    Some(Circle { point, radius })
}

/// Parse a whitespace separated list of points; any bad token rejects the whole polygon
///
/// Point count and closure are not checked here.
pub fn parse_polygon(text: &str) -> Option<Polygon> {
    let mut point = Vec::new();
    for token in text.split_whitespace() {
        point.push(parse_point(token)?);
    }
    Some(Polygon { point })
}

/// Parse whitespace separated values, double quotes grouping values that contain spaces
///
/// `\"` inside a value is a literal quote and `\\` a literal backslash. Returns `None` when no
/// value is found.
pub fn parse_group(text: &str) -> Option<Group> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('"' | '\\')) => {
                current.extend(chars.next());
                started = true;
            }
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    values.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        values.push(current);
    }

    if values.is_empty() {
        None
    } else {
        Some(Group { value: values })
    }
}

/// Parse a CAP 1.0 `name=value` pair
pub fn parse_value_pair_10(text: &str) -> Option<ValuePair> {
    let mut parts = text.split('=');
    let name = parts.next()?.trim();
    let value = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    Some(ValuePair::new(name, value))
}

pub fn format_point(point: &Point) -> String {
    format!("{},{}", point.latitude, point.longitude)
}

pub fn format_circle(circle: &Circle) -> String {
    format!("{} {}", format_point(&circle.point), circle.radius)
}

pub fn format_polygon(polygon: &Polygon) -> String {
    polygon
        .point
        .iter()
        .map(format_point)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inverse of [`parse_group`]: values with whitespace are quoted, backslashes and quotes escaped
pub fn format_group(group: &Group) -> String {
    group
        .value
        .iter()
        .map(|value| {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                format!("\"{}\"", escaped)
            } else {
                escaped
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_value_pair_10(pair: &ValuePair) -> String {
    format!("{}={}", pair.value_name, pair.value)
}

/// Text as quoted in a diagnostic, cut to a bounded length
pub fn truncate_for_message(text: &str) -> String {
    if text.chars().count() <= MAX_ECHO_LEN {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_ECHO_LEN - 3).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1.5,-2"), Some(Point::new(1.5, -2.0)));
        assert_eq!(parse_point("1.5"), None);
        assert_eq!(parse_point("1,2,3"), None);
        assert_eq!(parse_point("a,2"), None);
    }

    #[test]
    fn test_parse_circle() {
        let circle = parse_circle("  32.9525,-115.5527 0 ").unwrap();
        assert_eq!(circle.point, Point::new(32.9525, -115.5527));
        assert_eq!(circle.radius, 0.0);
        assert!(parse_circle("32.9525,-115.5527").is_none());
        assert!(parse_circle("32.9525,-115.5527 1 2").is_none());
        assert!(parse_circle("north 1").is_none());
    }

    #[test]
    fn test_parse_polygon() {
        let polygon = parse_polygon("1,2 3,4 5,6 1,2").unwrap();
        assert_eq!(polygon.point.len(), 4);
        assert!(polygon.is_closed());

        let short = parse_polygon("1,2 3,4 1,2").unwrap();
        assert_eq!(short.point.len(), 3);

        let open = parse_polygon("1,2 3,4 5,6 7,8").unwrap();
        assert!(!open.is_closed());

        assert!(parse_polygon("1,2 3,x 1,2").is_none());
    }

    #[test]
    fn test_parse_polygon_many_points() {
        let text = vec!["1,2"; 20_000].join(" ");
        assert_eq!(parse_polygon(&text).unwrap().point.len(), 20_000);
    }

    #[test]
    fn test_parse_group() {
        let group = parse_group("\"hello world\" plain").unwrap();
        assert_eq!(group.value, vec!["hello world", "plain"]);
        assert_eq!(
            parse_group("  a\tb\n c ").unwrap().value,
            vec!["a", "b", "c"]
        );
        assert_eq!(
            parse_group(r#""say \"hi\"" x"#).unwrap().value,
            vec![r#"say "hi""#, "x"]
        );
        assert!(parse_group("   ").is_none());
        assert!(parse_group("").is_none());
    }

    #[test]
    fn test_group_quoting_round_trip() {
        let group = Group::new(["hello world", "plain"]);
        let text = format_group(&group);
        assert_eq!(text, "\"hello world\" plain");
        assert_eq!(parse_group(&text), Some(group));

        let tricky = Group::new([r#"a "b" c"#, r#"q"x"#]);
        assert_eq!(parse_group(&format_group(&tricky)), Some(tricky));
    }

    #[test]
    fn test_group_backslashes_round_trip() {
        let group = Group::new(["a \\", "b", r"C:\path", r#"end\""#]);
        let text = format_group(&group);
        assert_eq!(text, r#""a \\" b C:\\path end\\\""#);
        assert_eq!(parse_group(&text), Some(group));

        assert_eq!(parse_group(r"a\b").unwrap().value, vec![r"a\b"]);
    }

    #[test]
    fn test_parse_value_pair_10() {
        assert_eq!(
            parse_value_pair_10(" HSAS = ORANGE "),
            Some(ValuePair::new("HSAS", "ORANGE"))
        );
        assert!(parse_value_pair_10("HSAS").is_none());
        assert!(parse_value_pair_10("a=b=c").is_none());
        assert_eq!(format_value_pair_10(&ValuePair::new("G1", "v1")), "G1=v1");
    }

    #[test]
    fn test_format_geometry() {
        let polygon = parse_polygon("38.47,-120.14 38.34,-119.95 38.47,-120.14").unwrap();
        assert_eq!(
            format_polygon(&polygon),
            "38.47,-120.14 38.34,-119.95 38.47,-120.14"
        );
        let circle = Circle {
            point: Point::new(1.0, 2.5),
            radius: 10.0,
        };
        assert_eq!(format_circle(&circle), "1,2.5 10");
        assert_eq!(parse_circle(&format_circle(&circle)), Some(circle));
    }

    #[test]
    fn test_truncate_for_message() {
        assert_eq!(truncate_for_message("short"), "short");
        let long = "x".repeat(80);
        let cut = truncate_for_message(&long);
        assert_eq!(cut.len(), 50);
        assert!(cut.ends_with("..."));
    }
}
