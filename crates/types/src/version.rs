//! Release version labels
//!
//! A release version is an opaque label chosen by the publisher (`1.2.0`,
//! `2024-06-r3`, ...). It becomes a path segment of every artifact locator,
//! so it is restricted to characters that cannot escape that segment.

use plugfetch_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version label used to address a release on the download server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion(String);

impl ReleaseVersion {
    /// Validate and wrap a version label
    ///
    /// # Errors
    ///
    /// Returns an error if the label is empty, is `.` or `..`, or contains a
    /// path separator, whitespace, or a URL query/fragment character.
    pub fn new(label: impl Into<String>) -> Result<Self, Error> {
        let label = label.into();
        let invalid = label.is_empty()
            || label == "."
            || label == ".."
            || label
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%'));
        if invalid {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                value: label,
            }
            .into());
        }
        Ok(Self(label))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReleaseVersion> for String {
    fn from(version: ReleaseVersion) -> Self {
        version.0
    }
}
