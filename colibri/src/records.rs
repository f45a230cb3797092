//! Typed results of the fixed-arity commands.
//!
//! All records are decoded from responses whose arity has already been
//! checked by [`crate::protocol::interpret`]; field parsing still fails with
//! a protocol error instead of defaulting to zero.

use crate::error::Result;
use crate::protocol::Response;
use bitflags::bitflags;
use std::fmt;

/// Optical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Wavelength {
    /// 230 nm.
    Nm230,
    /// 260 nm.
    Nm260,
    /// 280 nm.
    Nm280,
    /// 340 nm.
    Nm340,
}

impl Wavelength {
    /// Channels in wire order.
    pub const ALL: [Self; 4] = [Self::Nm230, Self::Nm260, Self::Nm280, Self::Nm340];

    /// Wavelength in nanometres.
    #[must_use]
    pub fn nanometres(self) -> u32 {
        match self {
            Self::Nm230 => 230,
            Self::Nm260 => 260,
            Self::Nm280 => 280,
            Self::Nm340 => 340,
        }
    }
}

impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}nm", self.nanometres())
    }
}

/// Sample and reference voltage of one channel, in µV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Sample channel.
    pub sample: u32,
    /// Reference channel.
    pub reference: u32,
}

/// One measurement or baseline: a reading per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// Readings in [`Wavelength::ALL`] order.
    pub readings: [Reading; 4],
}

impl Measurement {
    /// Decode `M`/`G` response tokens 1..=8.
    pub fn from_response(response: &Response) -> Result<Self> {
        let mut readings = [Reading::default(); 4];
        for (i, reading) in readings.iter_mut().enumerate() {
            reading.sample = response.number(1 + 2 * i)?;
            reading.reference = response.number(2 + 2 * i)?;
        }
        Ok(Self { readings })
    }

    /// Reading of one channel.
    #[must_use]
    pub fn reading(&self, wavelength: Wavelength) -> Reading {
        self.readings[wavelength as usize]
    }

    /// Iterate channels with their wavelength.
    pub fn iter(&self) -> impl Iterator<Item = (Wavelength, Reading)> + '_ {
        Wavelength::ALL.into_iter().zip(self.readings.iter().copied())
    }
}

impl fmt::Display for Measurement {
    /// Space separated `sample reference` pairs in wire order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .readings
            .iter()
            .flat_map(|r| [r.sample.to_string(), r.reference.to_string()])
            .collect();
        f.write_str(&fields.join(" "))
    }
}

/// Outcome of levelling one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetupResult {
    /// Target reached.
    Ok,
    /// No amplification setting reached the target.
    AmplificationNotFound,
    /// Reference channel saturated.
    ReferenceTooHigh,
    /// Sample channel saturated.
    SampleTooHigh,
    /// Code not known to this library.
    Other(u32),
}

impl SetupResult {
    /// Map the device's result code.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::AmplificationNotFound,
            2 => Self::ReferenceTooHigh,
            3 => Self::SampleTooHigh,
            other => Self::Other(other),
        }
    }

    /// Numeric code as sent by the device.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::AmplificationNotFound => 1,
            Self::ReferenceTooHigh => 2,
            Self::SampleTooHigh => 3,
            Self::Other(code) => code,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AmplificationNotFound => "No amplification found",
            Self::ReferenceTooHigh => "Reference channel too high",
            Self::SampleTooHigh => "Sample channel too high",
            Self::Other(_) => "?",
        }
    }
}

/// Levelling result of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevellingRecord {
    /// Setup result.
    pub result: SetupResult,
    /// LED drive current in µA.
    pub current: u32,
    /// Sample amplifier selector.
    pub amplification_sample: u32,
    /// Reference amplifier selector.
    pub amplification_reference: u32,
}

/// Levelling of all four channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Levelling {
    /// Records in [`Wavelength::ALL`] order.
    pub channels: [LevellingRecord; 4],
}

impl Levelling {
    /// Decode `C` response tokens 1..=16.
    pub fn from_response(response: &Response) -> Result<Self> {
        let mut channels = [LevellingRecord {
            result: SetupResult::Ok,
            current: 0,
            amplification_sample: 0,
            amplification_reference: 0,
        }; 4];
        for (i, channel) in channels.iter_mut().enumerate() {
            let base = 1 + 4 * i;
            channel.result = SetupResult::from_code(response.number(base)?);
            channel.current = response.number(base + 1)?;
            channel.amplification_sample = response.number(base + 2)?;
            channel.amplification_reference = response.number(base + 3)?;
        }
        Ok(Self { channels })
    }

    /// Whether every channel reached its target.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.channels
            .iter()
            .all(|c| c.result == SetupResult::Ok)
    }

    /// Record of one channel.
    #[must_use]
    pub fn channel(&self, wavelength: Wavelength) -> &LevellingRecord {
        &self.channels[wavelength as usize]
    }
}

impl fmt::Display for Levelling {
    /// Space separated `result current sample reference` groups in wire order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .channels
            .iter()
            .flat_map(|c| {
                [
                    c.result.code(),
                    c.current,
                    c.amplification_sample,
                    c.amplification_reference,
                ]
            })
            .map(|v| v.to_string())
            .collect();
        f.write_str(&fields.join(" "))
    }
}

bitflags! {
    /// Failed checks reported by the selftest. Empty means passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SelftestFlags: u32 {
        /// LED current 230 nm.
        const ILED_230 = 0x0000_0001;
        /// LED current 260 nm.
        const ILED_260 = 0x0000_0002;
        /// LED current 280 nm.
        const ILED_280 = 0x0000_0004;
        /// LED current 340 nm.
        const ILED_340 = 0x0000_0008;
        /// Sample signal 230 nm.
        const SAMPLE_230 = 0x0000_0010;
        /// Sample signal 260 nm.
        const SAMPLE_260 = 0x0000_0020;
        /// Sample signal 280 nm.
        const SAMPLE_280 = 0x0000_0040;
        /// Sample signal 340 nm.
        const SAMPLE_340 = 0x0000_0080;
        /// Reference signal 230 nm.
        const REFERENCE_230 = 0x0000_0100;
        /// Reference signal 260 nm.
        const REFERENCE_260 = 0x0000_0200;
        /// Reference signal 280 nm.
        const REFERENCE_280 = 0x0000_0400;
        /// Reference signal 340 nm.
        const REFERENCE_340 = 0x0000_0800;
        /// Reference channel.
        const REFERENCE = 0x0000_1000;
        /// Sample channel.
        const SAMPLE = 0x0000_2000;
    }
}

impl SelftestFlags {
    /// Decode the `Y` response flag word. Unknown bits are kept.
    pub fn from_response(response: &Response) -> Result<Self> {
        Ok(Self::from_bits_retain(response.number(1)?))
    }

    /// Whether no check failed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.is_empty()
    }

    /// Names of the failed checks, one per set known bit.
    pub fn failures(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Parameter index for `V` get/set commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Index {
    /// Numeric index sent on the wire.
    pub id: u32,
    /// What the value means.
    pub description: &'static str,
    /// Whether `V i v` is accepted.
    pub writable: bool,
}

/// Known parameter indices.
pub const INDICES: &[Index] = &[
    Index { id: 0, description: "Firmware version", writable: false },
    Index { id: 1, description: "Serial number", writable: true },
    Index { id: 2, description: "Hardware type", writable: true },
    Index { id: 10, description: "Number of stored measurements", writable: false },
    Index { id: 23, description: "LED 230nm max current [uA]", writable: true },
    Index { id: 33, description: "LED 260nm max current [uA]", writable: true },
    Index { id: 43, description: "LED 280nm max current [uA]", writable: true },
    Index { id: 53, description: "LED 340nm max current [uA]", writable: true },
    Index { id: 60, description: "Sample amplification factor x1.1", writable: true },
    Index { id: 61, description: "Sample amplification factor x11", writable: true },
    Index { id: 62, description: "Sample amplification factor x111", writable: true },
    Index { id: 63, description: "Reference amplification factor x1.1", writable: true },
    Index { id: 64, description: "Reference amplification factor x11", writable: true },
    Index { id: 65, description: "Reference amplification factor x111", writable: true },
    Index { id: 80, description: "Levelling target 230nm [uV]", writable: true },
    Index { id: 81, description: "Levelling target 260nm [uV]", writable: true },
    Index { id: 82, description: "Levelling target 280nm [uV]", writable: true },
    Index { id: 83, description: "Levelling target 340nm [uV]", writable: true },
];

/// Index holding the firmware version.
pub const INDEX_VERSION: u32 = 0;

/// Index holding the number of stored measurements.
pub const INDEX_LAST_MEASUREMENT_COUNT: u32 = 10;

impl Index {
    /// Look up a known index.
    #[must_use]
    pub fn lookup(id: u32) -> Option<&'static Index> {
        INDICES.iter().find(|i| i.id == id)
    }
}
