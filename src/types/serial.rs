// ABOUTME: Validated instrument serial number.
// ABOUTME: Serials key every record set, override entry and bus event.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_SERIAL_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceSerialError {
    #[error("device serial cannot be empty")]
    Empty,

    #[error("device serial exceeds maximum length of {MAX_SERIAL_LEN} characters")]
    TooLong,

    #[error("invalid character in device serial: {0:?}")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceSerial(String);

impl DeviceSerial {
    pub fn new(value: &str) -> Result<Self, DeviceSerialError> {
        if value.is_empty() {
            return Err(DeviceSerialError::Empty);
        }

        if value.chars().count() > MAX_SERIAL_LEN {
            return Err(DeviceSerialError::TooLong);
        }

        if let Some(c) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(DeviceSerialError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DeviceSerial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeviceSerial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DeviceSerial::new(&s).map_err(serde::de::Error::custom)
    }
}
