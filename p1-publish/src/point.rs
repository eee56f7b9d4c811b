//! InfluxDB line protocol points

use p1_core::{P1Error, P1Result};
use p1_telegram::TelegramRecord;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Measurement name used when none is configured
pub const DEFAULT_MEASUREMENT: &str = "smartmeter";

/// One line protocol point
///
/// No timestamp is written; the receiving server assigns its own.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxPoint {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, f64)>,
}

impl InfluxPoint {
    /// Create an empty point
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    /// Build a point from a record, skipping absent and non-finite values
    pub fn from_record(
        measurement: &str,
        tags: &BTreeMap<String, String>,
        record: &TelegramRecord,
    ) -> Self {
        let mut point = Self::new(measurement);
        point.tags = tags.clone();
        for (id, value) in record.present() {
            point = point.field(id.as_str(), value);
        }
        point
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn field(mut self, key: &str, value: f64) -> Self {
        if value.is_finite() {
            self.fields.push((key.to_string(), value));
        }
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    /// A point without fields cannot be written
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the point as one line protocol line, without terminator
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            let separator = if i == 0 { ' ' } else { ',' };
            let _ = write!(line, "{}{}={}", separator, escape(key, &[',', '=', ' ']), value);
        }

        line
    }
}

fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Parse `key=value` tag arguments
pub fn parse_tags<S: AsRef<str>>(tags: &[S]) -> P1Result<BTreeMap<String, String>> {
    tags.iter()
        .map(|tag| {
            let tag = tag.as_ref();
            match tag.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                    Ok((key.to_string(), value.to_string()))
                }
                _ => Err(P1Error::Config(format!("Tag must be key=value: {}", tag))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use p1_telegram::FieldId;

    #[test]
    fn test_line_protocol() {
        let point = InfluxPoint::new("smartmeter")
            .tag("location", "home")
            .field("+T1", 123.456)
            .field("P", -1.5);
        assert_eq!(point.to_line_protocol(), "smartmeter,location=home +T1=123.456,P=-1.5");
    }

    #[test]
    fn test_escaping() {
        let point = InfluxPoint::new("smart meter,1")
            .tag("the place", "a=b")
            .field("V_1", 230.0);
        assert_eq!(
            point.to_line_protocol(),
            r"smart\ meter\,1,the\ place=a\=b V_1=230"
        );
    }

    #[test]
    fn test_from_record_skips_absent_fields() {
        let mut record = TelegramRecord::new();
        record.set(FieldId::ImportedT1, Some(1.0));
        record.set(FieldId::Gas, Some(0.0));
        let point = InfluxPoint::from_record(DEFAULT_MEASUREMENT, &BTreeMap::new(), &record);
        let keys: Vec<&str> = point.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["+T1", "G"]);
    }

    #[test]
    fn test_non_finite_values_dropped() {
        let point = InfluxPoint::new("m").field("x", f64::NAN);
        assert!(point.is_empty());
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(&["location=home", "meter=ISK5"]).unwrap();
        assert_eq!(tags.get("location").map(String::as_str), Some("home"));
        assert_eq!(tags.len(), 2);

        assert!(parse_tags(&["novalue"]).is_err());
        assert!(parse_tags(&["=x"]).is_err());
        assert!(parse_tags::<&str>(&[]).unwrap().is_empty());
    }
}
