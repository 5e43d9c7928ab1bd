//! Package version model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid base version {0:?}: expected <major>.<minor>")]
    InvalidBase(String),

    #[error("invalid version {0:?}: expected <major>.<minor>.<patch>")]
    Invalid(String),
}

fn base_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)$").expect("valid regex"))
}

fn full_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("valid regex"))
}

/// `<major>.<minor>`, the hand-maintained part of the version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseVersion {
    pub major: u64,
    pub minor: u64,
}

impl BaseVersion {
    pub fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// Combine with a build counter into a full version
    pub fn with_build(self, build_number: u64) -> VersionString {
        VersionString::new(self.major, self.minor, build_number)
    }
}

impl FromStr for BaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = base_pattern()
            .captures(s)
            .ok_or_else(|| VersionError::InvalidBase(s.to_string()))?;
        let num = |i: usize| {
            caps[i]
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidBase(s.to_string()))
        };
        Ok(Self::new(num(1)?, num(2)?))
    }
}

impl TryFrom<String> for BaseVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BaseVersion> for String {
    fn from(value: BaseVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `<major>.<minor>.<patch>` where patch is the CI build number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionString {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionString {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Contents of the version declaration module
    pub fn declaration(&self) -> String {
        format!("__version__ = '{}'\n", self)
    }
}

impl FromStr for VersionString {
    type Err = VersionError;

    /// Strict parse: no surrounding whitespace, no prefixes, exactly three parts
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = full_pattern()
            .captures(s)
            .ok_or_else(|| VersionError::Invalid(s.to_string()))?;
        let num = |i: usize| {
            caps[i]
                .parse::<u64>()
                .map_err(|_| VersionError::Invalid(s.to_string()))
        };
        Ok(Self::new(num(1)?, num(2)?, num(3)?))
    }
}

impl TryFrom<String> for VersionString {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionString> for String {
    fn from(value: VersionString) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
