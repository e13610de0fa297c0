//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The value contained surrounding whitespace.
    #[error("{field} has surrounding whitespace: {value:?}")]
    Untrimmed { field: &'static str, value: String },

    /// A lap time was negative.
    #[error("lap time cannot be negative, got {micros}us")]
    NegativeLapTime { micros: i64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if id.trim() != id {
                    return Err(ValidationError::Untrimmed {
                        field: $field_name,
                        value: id,
                    });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated driver code.
    ///
    /// Codes are short identifiers (three letters in the race logs, e.g. `SVF`)
    /// and act as the primary key for drivers and their lap results.
    DriverCode, "driver code"
);

/// Elapsed lap duration with microsecond precision.
///
/// Rendered as `HH:MM:SS.ffffff`. Hours are not wrapped at 24, so a lap
/// spanning more than a day renders as e.g. `25:00:00.000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct LapTime(i64);

impl LapTime {
    const MICROS_PER_SECOND: i64 = 1_000_000;
    const MICROS_PER_MINUTE: i64 = 60 * Self::MICROS_PER_SECOND;
    const MICROS_PER_HOUR: i64 = 60 * Self::MICROS_PER_MINUTE;

    /// Creates a lap time from whole microseconds.
    pub fn from_micros(micros: i64) -> Result<Self, ValidationError> {
        if micros < 0 {
            return Err(ValidationError::NegativeLapTime { micros });
        }
        Ok(Self(micros))
    }

    /// Returns the lap time in whole microseconds.
    pub const fn as_micros(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for LapTime {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_micros(value)
    }
}

impl From<LapTime> for i64 {
    fn from(time: LapTime) -> Self {
        time.0
    }
}

impl fmt::Display for LapTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / Self::MICROS_PER_HOUR;
        let minutes = (self.0 % Self::MICROS_PER_HOUR) / Self::MICROS_PER_MINUTE;
        let seconds = (self.0 % Self::MICROS_PER_MINUTE) / Self::MICROS_PER_SECOND;
        let micros = self.0 % Self::MICROS_PER_SECOND;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}
