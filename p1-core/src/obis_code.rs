use std::fmt;

/// OBIS (Object Identification System) code
///
/// Six value groups identifying a metered quantity. P1 telegrams print the
/// reduced form `A-B:C.D.E`, leaving F implicit (255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Create a new OBIS code from individual value groups
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Create an OBIS code from the five groups printed in telegrams
    pub const fn reduced(a: u8, b: u8, c: u8, d: u8, e: u8) -> Self {
        Self::new(a, b, c, d, e, 255)
    }

    /// Format as printed on a telegram line, e.g. `1-0:1.8.1`
    pub fn to_reduced_string(&self) -> String {
        format!(
            "{}-{}:{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4]
        )
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2],
            self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduced_defaults_f_group() {
        assert_eq!(ObisCode::reduced(1, 0, 1, 8, 1), ObisCode::new(1, 0, 1, 8, 1, 255));
    }

    #[test]
    fn test_obis_code_display() {
        let code = ObisCode::reduced(1, 0, 21, 7, 0);
        assert_eq!(format!("{}", code), "1.0.21.7.0.255");
        assert_eq!(code.to_reduced_string(), "1-0:21.7.0");
        assert_eq!(ObisCode::reduced(0, 1, 24, 2, 1).to_reduced_string(), "0-1:24.2.1");
    }
}
