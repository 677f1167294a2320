use semver::Version;

use crate::error::{Error, Result};

/// Supported Web API versions, `[min, max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionRange {
    /// Inclusive lower bound.
    pub min: Version,
    /// Exclusive upper bound.
    pub max: Version,
}

impl ApiVersionRange {
    /// Range accepted by the historical version-gated client.
    pub const LEGACY: Self = Self {
        min: Version::new(0, 14, 0),
        max: Version::new(0, 18, 0),
    };

    pub fn new(min: Version, max: Version) -> Result<Self> {
        if min >= max {
            return Err(Error::invalid_argument(format!(
                "empty API version range: {min} >= {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// Parses both bounds, e.g. `ApiVersionRange::parse("0.14.0", "0.18.0")`.
    pub fn parse(min: &str, max: &str) -> Result<Self> {
        let parse = |s: &str| {
            Version::parse(s.trim())
                .map_err(|e| Error::invalid_argument(format!("bad version {s:?}: {e}")))
        };
        Self::new(parse(min)?, parse(max)?)
    }

    pub fn matches(&self, version: &Version) -> bool {
        *version >= self.min && *version < self.max
    }

    /// Checks the version string reported by the server.
    ///
    /// A missing or unparsable version is treated as incompatible.
    pub(crate) fn check(&self, reported: Option<&str>) -> Result<()> {
        let incompatible = |found: &str| Error::IncompatibleApiVersion {
            found: found.to_string(),
            min: self.min.clone(),
            max: self.max.clone(),
        };
        let Some(raw) = reported else {
            return Err(incompatible("(not reported)"));
        };
        match Version::parse(raw.trim()) {
            Ok(v) if self.matches(&v) => Ok(()),
            _ => Err(incompatible(raw)),
        }
    }
}
