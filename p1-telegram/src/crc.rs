//! CRC-16 telegram checksum
//!
//! DSMR uses CRC-16/ARC: polynomial 0x8005 processed LSB first, initial
//! value 0x0000, no final xor. The checksum covers every byte from the `/`
//! of the header up to and including the `!` of the trailer.

/// CRC calculation constants
const INITIAL_CRC: u16 = 0x0000;
const KEY: u16 = 0xA001; // Bit-reversed 8005

/// Precomputed CRC table
static CRC_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFF {
        let mut v = b as u16;
        for _ in 0..8 {
            if (v & 1) == 1 {
                v = (v >> 1) ^ KEY;
            } else {
                v >>= 1;
            }
        }
        table[b as usize] = v;
    }
    table
});

/// Incremental CRC-16 calculator
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    /// Create a new calculator
    pub fn new() -> Self {
        Self { value: INITIAL_CRC }
    }

    /// Update the CRC with a single byte
    pub fn update(&mut self, data: u8) {
        self.value = (self.value >> 8) ^ CRC_TABLE[((self.value ^ data as u16) & 0xFF) as usize];
    }

    /// Update the CRC with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Get the current CRC value
    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-16 of a byte region
pub fn crc16(data: &[u8]) -> u16 {
    let mut calc = Crc16::new();
    calc.update_bytes(data);
    calc.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16(b""), 0x0000);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"/ISK5\\2M550T-1012\r\n\r\n1-0:1.8.1(000123.456*kWh)\r\n!";
        let mut calc = Crc16::new();
        for chunk in data.chunks(7) {
            calc.update_bytes(chunk);
        }
        assert_eq!(calc.value(), crc16(data));
    }
}
