//! Dotted version numbers reported by environment probes

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid version: '{0}'")]
pub struct VersionParseError(pub String);

/// A dotted numeric version such as `17.8.34330` or `3.11`.
///
/// Missing trailing components compare as zero, so `17` == `17.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        let parts = parts.into();
        if parts.is_empty() {
            return Self { parts: vec![0] };
        }
        Self { parts }
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    pub fn major(&self) -> u64 {
        self.component(0)
    }

    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .parts
            .iter()
            .rposition(|p| *p != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.parts[..len]
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(|c| c == 'v' || c == 'V');
        if trimmed.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }

        let mut parts = Vec::new();
        for piece in trimmed.split('.') {
            let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return Err(VersionParseError(s.to_string()));
            }
            let value = digits
                .parse::<u64>()
                .map_err(|_| VersionParseError(s.to_string()))?;
            parts.push(value);

            // A suffix such as "rc1" or "-preview" ends the numeric part.
            if digits.len() != piece.len() {
                break;
            }
        }

        Ok(Self { parts })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_visual_studio_version() {
        let version: Version = "17.8.34330.188".parse().unwrap();
        assert_eq!(version.major(), 17);
        assert_eq!(version.minor(), 8);
        assert_eq!(version.to_string(), "17.8.34330.188");
    }

    #[test]
    fn test_parse_prerelease_suffix() {
        let version: Version = "3.13.0rc1".parse().unwrap();
        assert_eq!(version.parts(), &[3, 13, 0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("latest".parse::<Version>().is_err());
        assert!("1..2".parse::<Version>().is_err());
    }

    #[test]
    fn test_trailing_zeros_compare_equal() {
        assert_eq!(Version::new([17]), "17.0.0".parse().unwrap());
        assert!(Version::new([16, 11]) < Version::new([17]));
        assert!(Version::new([17, 0, 1]) > Version::new([17]));
    }

    #[test]
    fn test_serde_as_string() {
        let version = Version::new([3, 11, 4]);
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"3.11.4\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
    }
}
