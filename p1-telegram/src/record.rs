//! Telegram record: the measurements extracted from one telegram

use p1_core::{P1Error, P1Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of one measurement in a telegram record
///
/// The names are the keys published downstream and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    /// Energy imported, tariff 1 (kWh)
    ImportedT1,
    /// Energy exported, tariff 1 (kWh)
    ExportedT1,
    /// Energy imported, tariff 2 (kWh)
    ImportedT2,
    /// Energy exported, tariff 2 (kWh)
    ExportedT2,
    /// Active power imported (kW)
    ImportedPower,
    /// Active power exported (kW)
    ExportedPower,
    VoltageL1,
    VoltageL2,
    VoltageL3,
    ImportedPowerL1,
    ImportedPowerL2,
    ImportedPowerL3,
    ExportedPowerL1,
    ExportedPowerL2,
    ExportedPowerL3,
    /// Gas volume (m3)
    Gas,
    /// Total energy imported, `+T1 + +T2`
    ImportedTotal,
    /// Total energy exported, `-T1 + -T2`
    ExportedTotal,
    /// Net active power, `+P - -P`
    NetPower,
}

impl FieldId {
    pub const COUNT: usize = 19;

    /// All identifiers in publishing order
    pub const ALL: [FieldId; FieldId::COUNT] = [
        FieldId::ImportedT1,
        FieldId::ExportedT1,
        FieldId::ImportedT2,
        FieldId::ExportedT2,
        FieldId::ImportedPower,
        FieldId::ExportedPower,
        FieldId::VoltageL1,
        FieldId::VoltageL2,
        FieldId::VoltageL3,
        FieldId::ImportedPowerL1,
        FieldId::ImportedPowerL2,
        FieldId::ImportedPowerL3,
        FieldId::ExportedPowerL1,
        FieldId::ExportedPowerL2,
        FieldId::ExportedPowerL3,
        FieldId::Gas,
        FieldId::ImportedTotal,
        FieldId::ExportedTotal,
        FieldId::NetPower,
    ];

    /// Published key of this field
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::ImportedT1 => "+T1",
            FieldId::ExportedT1 => "-T1",
            FieldId::ImportedT2 => "+T2",
            FieldId::ExportedT2 => "-T2",
            FieldId::ImportedPower => "+P",
            FieldId::ExportedPower => "-P",
            FieldId::VoltageL1 => "V_1",
            FieldId::VoltageL2 => "V_2",
            FieldId::VoltageL3 => "V_3",
            FieldId::ImportedPowerL1 => "+P_1",
            FieldId::ImportedPowerL2 => "+P_2",
            FieldId::ImportedPowerL3 => "+P_3",
            FieldId::ExportedPowerL1 => "-P_1",
            FieldId::ExportedPowerL2 => "-P_2",
            FieldId::ExportedPowerL3 => "-P_3",
            FieldId::Gas => "G",
            FieldId::ImportedTotal => "+T",
            FieldId::ExportedTotal => "-T",
            FieldId::NetPower => "P",
        }
    }

    /// Computed from other fields rather than read from the telegram
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            FieldId::ImportedTotal | FieldId::ExportedTotal | FieldId::NetPower
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = P1Error;

    fn from_str(s: &str) -> P1Result<Self> {
        FieldId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| P1Error::InvalidData(format!("Unknown field identifier: {}", s)))
    }
}

/// Measurements of one telegram
///
/// Maps every [`FieldId`] to an optional value. `None` means the telegram
/// did not carry the field, which is normal for single-phase meters or
/// meters without a gas channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelegramRecord {
    values: [Option<f64>; FieldId::COUNT],
}

impl TelegramRecord {
    /// Create a record with every field absent
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FieldId) -> Option<f64> {
        self.values[id.index()]
    }

    pub fn set(&mut self, id: FieldId, value: Option<f64>) {
        self.values[id.index()] = value;
    }

    /// All fields in publishing order, present or not
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, Option<f64>)> + '_ {
        FieldId::ALL.iter().map(move |&id| (id, self.get(id)))
    }

    /// Only the fields present in this record
    pub fn present(&self) -> impl Iterator<Item = (FieldId, f64)> + '_ {
        self.iter().filter_map(|(id, value)| value.map(|v| (id, v)))
    }

    /// Compute the derived fields from the extracted ones
    ///
    /// Absent operands count as zero, so derived fields are always present.
    pub fn compute_derived(&mut self) {
        let operand = |id: FieldId| self.get(id).unwrap_or(0.0);

        let imported = operand(FieldId::ImportedT1) + operand(FieldId::ImportedT2);
        let exported = operand(FieldId::ExportedT1) + operand(FieldId::ExportedT2);
        let net = operand(FieldId::ImportedPower) - operand(FieldId::ExportedPower);

        self.set(FieldId::ImportedTotal, Some(imported));
        self.set(FieldId::ExportedTotal, Some(exported));
        self.set(FieldId::NetPower, Some(net));
    }
}

impl Serialize for TelegramRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FieldId::COUNT))?;
        for (id, value) in self.iter() {
            map.serialize_entry(id.as_str(), &value)?;
        }
        map.end()
    }
}
