//! Presentation helpers shared by the daemon API and the CLI.

use std::fmt;

/// Reference RSSI at one metre.
pub const MEASURED_POWER_DBM: i16 = -69;

/// Path-loss exponent for a typical indoor environment.
pub const ENVIRONMENT_FACTOR: f64 = 2.5;

/// Blood group as carried in the 4-bit wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloodGroup {
    APos,
    ANeg,
    BPos,
    BNeg,
    AbPos,
    AbNeg,
    OPos,
    ONeg,
    Unknown,
    /// Index outside the known list. Shown, never rejected.
    Other(u8),
}

impl From<u8> for BloodGroup {
    fn from(index: u8) -> Self {
        match index {
            0 => BloodGroup::APos,
            1 => BloodGroup::ANeg,
            2 => BloodGroup::BPos,
            3 => BloodGroup::BNeg,
            4 => BloodGroup::AbPos,
            5 => BloodGroup::AbNeg,
            6 => BloodGroup::OPos,
            7 => BloodGroup::ONeg,
            8 => BloodGroup::Unknown,
            other => BloodGroup::Other(other),
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BloodGroup::APos => f.write_str("A+"),
            BloodGroup::ANeg => f.write_str("A-"),
            BloodGroup::BPos => f.write_str("B+"),
            BloodGroup::BNeg => f.write_str("B-"),
            BloodGroup::AbPos => f.write_str("AB+"),
            BloodGroup::AbNeg => f.write_str("AB-"),
            BloodGroup::OPos => f.write_str("O+"),
            BloodGroup::ONeg => f.write_str("O-"),
            BloodGroup::Unknown => f.write_str("Unknown"),
            BloodGroup::Other(index) => write!(f, "Idx {index}"),
        }
    }
}

/// Rough distance in metres from a signal strength reading.
///
/// Log-distance path loss model. Returns None for readings that carry no
/// information (0, or weaker than -100 dBm).
pub fn estimate_distance(rssi: i16) -> Option<f64> {
    if rssi == 0 || rssi < -100 {
        return None;
    }
    let exponent =
        (f64::from(MEASURED_POWER_DBM) - f64::from(rssi)) / (10.0 * ENVIRONMENT_FACTOR);
    Some(10f64.powf(exponent))
}
