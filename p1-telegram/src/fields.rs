//! Static field table: which telegram line carries which measurement

use crate::record::FieldId;
use once_cell::sync::Lazy;
use p1_core::ObisCode;
use regex::bytes::Regex;

/// How a field's line is recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPattern {
    /// `<obis>(<value>*<unit>)` on a line of its own
    Register { obis: ObisCode, unit: &'static str },
    /// Gas reading: `0-1:24.2.1` with optional capture timestamp, or a bare
    /// `(<value>)` continuation line as sent by DSMR 2.2 meters; unit optional
    Gas,
}

/// Declarative description of one extracted field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub pattern: FieldPattern,
    /// Value reported when the line is absent
    pub default: Option<f64>,
}

const fn register(id: FieldId, obis: ObisCode, unit: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        id,
        pattern: FieldPattern::Register { obis, unit },
        default: None,
    }
}

/// Every field read from a telegram, in extraction order
pub static FIELD_TABLE: [FieldDescriptor; 16] = [
    register(FieldId::ImportedT1, ObisCode::reduced(1, 0, 1, 8, 1), "kWh"),
    register(FieldId::ExportedT1, ObisCode::reduced(1, 0, 2, 8, 1), "kWh"),
    register(FieldId::ImportedT2, ObisCode::reduced(1, 0, 1, 8, 2), "kWh"),
    register(FieldId::ExportedT2, ObisCode::reduced(1, 0, 2, 8, 2), "kWh"),
    register(FieldId::ImportedPower, ObisCode::reduced(1, 0, 1, 7, 0), "kW"),
    register(FieldId::ExportedPower, ObisCode::reduced(1, 0, 2, 7, 0), "kW"),
    register(FieldId::VoltageL1, ObisCode::reduced(1, 0, 32, 7, 0), "V"),
    register(FieldId::VoltageL2, ObisCode::reduced(1, 0, 52, 7, 0), "V"),
    register(FieldId::VoltageL3, ObisCode::reduced(1, 0, 72, 7, 0), "V"),
    register(FieldId::ImportedPowerL1, ObisCode::reduced(1, 0, 21, 7, 0), "kW"),
    register(FieldId::ImportedPowerL2, ObisCode::reduced(1, 0, 41, 7, 0), "kW"),
    register(FieldId::ImportedPowerL3, ObisCode::reduced(1, 0, 61, 7, 0), "kW"),
    register(FieldId::ExportedPowerL1, ObisCode::reduced(1, 0, 22, 7, 0), "kW"),
    register(FieldId::ExportedPowerL2, ObisCode::reduced(1, 0, 42, 7, 0), "kW"),
    register(FieldId::ExportedPowerL3, ObisCode::reduced(1, 0, 62, 7, 0), "kW"),
    FieldDescriptor {
        id: FieldId::Gas,
        pattern: FieldPattern::Gas,
        default: Some(0.0),
    },
];

/// Value text up to the unit separator; numeric checks happen on conversion
const VALUE_CAPTURE: &str = r"([^*()\r\n]*)";

impl FieldPattern {
    /// Regular expression matching the field's line, anchored at line start
    /// in multi-line mode, with the value text in capture group 1
    pub fn to_regex_source(&self) -> String {
        match self {
            FieldPattern::Register { obis, unit } => format!(
                r"(?m)^{}\({}\*{}\)\r\n",
                regex::escape(&obis.to_reduced_string()),
                VALUE_CAPTURE,
                regex::escape(unit)
            ),
            FieldPattern::Gas => format!(
                r"(?m)^(?:0-1:24\.2\.1(?:\([^()\r\n]*\))?)?\({}(?:\*m3)?\)\r\n",
                VALUE_CAPTURE
            ),
        }
    }
}

/// Field table with compiled patterns
pub(crate) static COMPILED_FIELDS: Lazy<Vec<(FieldDescriptor, Regex)>> = Lazy::new(|| {
    FIELD_TABLE
        .iter()
        .map(|descriptor| {
            let regex = Regex::new(&descriptor.pattern.to_regex_source())
                .expect("field table patterns are valid");
            (*descriptor, regex)
        })
        .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    fn capture<'a>(id: FieldId, text: &'a [u8]) -> Option<&'a [u8]> {
        let (_, regex) = COMPILED_FIELDS.iter().find(|(d, _)| d.id == id)?;
        regex.captures(text).and_then(|c| c.get(1)).map(|m| m.as_bytes())
    }

    #[test]
    fn test_table_covers_every_extracted_field_once() {
        for id in FieldId::ALL.iter().filter(|id| !id.is_derived()) {
            assert_eq!(FIELD_TABLE.iter().filter(|d| d.id == *id).count(), 1, "{id}");
        }
        assert!(FIELD_TABLE.iter().all(|d| !d.id.is_derived()));
    }

    #[test]
    fn test_register_pattern_source() {
        let pattern = FieldPattern::Register {
            obis: ObisCode::reduced(1, 0, 1, 8, 1),
            unit: "kWh",
        };
        let source = pattern.to_regex_source();
        assert!(source.starts_with("(?m)^1"));
        assert!(source.ends_with(r"\*kWh\)\r\n"));
        assert!(source.contains(VALUE_CAPTURE));
    }

    #[test]
    fn test_register_anchored_at_line_start() {
        let text = b"/ISK5\r\nX1-0:1.8.1(000001.000*kWh)\r\n1-0:1.8.1(000123.456*kWh)\r\n";
        assert_eq!(capture(FieldId::ImportedT1, text), Some(&b"000123.456"[..]));
    }

    #[test]
    fn test_register_unit_must_match() {
        assert_eq!(capture(FieldId::ImportedPower, b"1-0:1.7.0(00.193*kW)\r\n"), Some(&b"00.193"[..]));
        assert_eq!(capture(FieldId::ImportedPower, b"1-0:1.7.0(00.193*W)\r\n"), None);
        assert_eq!(capture(FieldId::VoltageL2, b"1-0:52.7.0(230.1*V)\r\n"), Some(&b"230.1"[..]));
    }

    #[test]
    fn test_gas_line_variants() {
        let dsmr4 = b"0-1:24.2.1(101209112500W)(12785.123*m3)\r\n";
        assert_eq!(capture(FieldId::Gas, dsmr4), Some(&b"12785.123"[..]));

        let dsmr4_no_timestamp = b"0-1:24.2.1(00001.001*m3)\r\n";
        assert_eq!(capture(FieldId::Gas, dsmr4_no_timestamp), Some(&b"00001.001"[..]));

        let dsmr22 = b"0-1:24.3.0(120517020000)(08)(60)(1)(0-1:24.2.1)(m3)\r\n(00124.477)\r\n";
        assert_eq!(capture(FieldId::Gas, dsmr22), Some(&b"00124.477"[..]));
        let malformed = b"0-1:24.2.1(101209112500W)(12x85.123*m3)\r\n";
        assert_eq!(capture(FieldId::Gas, malformed), Some(&b"12x85.123"[..]));

        let empty = b"0-1:24.2.1(101209112500W)(*m3)\r\n";
        assert_eq!(capture(FieldId::Gas, empty), Some(&b""[..]));

        let other_unit = b"0-1:24.2.1(101209112500W)(00012.345*GJ)\r\n";
        assert_eq!(capture(FieldId::Gas, other_unit), None);
    }
}
