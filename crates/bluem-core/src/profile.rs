//! The local user's profile and the snapshot the encoder consumes.

use serde::{Deserialize, Serialize};

/// Latitude written when the profile has no location. Outside the valid ±90 range.
pub const UNSET_LATITUDE: f64 = 91.0;

/// Longitude written when the profile has no location. Outside the valid ±180 range.
pub const UNSET_LONGITUDE: f64 = 181.0;

/// Blood group index meaning "unknown".
pub const UNKNOWN_BLOOD_GROUP: u8 = 8;

/// Number of trailing phone-number characters considered for the suffix.
pub const PHONE_SUFFIX_CHARS: usize = 7;

/// Profile as the user entered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub phone_number: String,
    /// Index into the blood group list. None = unknown.
    pub blood_group: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// What the encoder needs, with "unset" already turned into sentinels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSnapshot {
    pub blood_group_index: u8,
    pub has_phone_suffix: bool,
    pub phone_suffix_digits: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl Profile {
    /// Reduce the profile to encoder input.
    ///
    /// The phone suffix is the digits among the last 7 characters, so
    /// "+1 555-1234" yields 551234. A location is only carried when both
    /// coordinates are present.
    pub fn snapshot(&self) -> ProfileSnapshot {
        let suffix = phone_suffix(&self.phone_number);
        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => (UNSET_LATITUDE, UNSET_LONGITUDE),
        };

        ProfileSnapshot {
            blood_group_index: self.blood_group.unwrap_or(UNKNOWN_BLOOD_GROUP),
            has_phone_suffix: !suffix.is_empty(),
            phone_suffix_digits: suffix.parse().unwrap_or(0),
            latitude,
            longitude,
        }
    }

    /// Reject values the wire format would silently mangle.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if let Some(index) = self.blood_group {
            if index > UNKNOWN_BLOOD_GROUP {
                return Err(ProfileError::BloodGroupOutOfRange(index));
            }
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ProfileError::LatitudeOutOfRange(lat));
            }
        }
        if let Some(lon) = self.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ProfileError::LongitudeOutOfRange(lon));
            }
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err(ProfileError::PartialLocation);
        }
        Ok(())
    }
}

fn phone_suffix(phone_number: &str) -> String {
    let chars: Vec<char> = phone_number.chars().collect();
    let start = chars.len().saturating_sub(PHONE_SUFFIX_CHARS);
    chars[start..].iter().filter(|c| c.is_ascii_digit()).collect()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("blood group index {0} is out of range 0..=8")]
    BloodGroupOutOfRange(u8),
    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("latitude and longitude must be set together")]
    PartialLocation,
}
