//! Numeric dot-segment version ordering
//!
//! Manifest versions compare by numeric segments ("1.10" > "1.9"),
//! never lexically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::traits::ModuleError;

/// A dot-separated numeric version string
///
/// Comparison and hashing consider only the numeric segments, so "1.0"
/// and "1.00" are equal; display preserves the original spelling.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl FromStr for Version {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ModuleError::InvalidVersion(s.to_string()));
        }
        let segments = raw
            .split('.')
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| ModuleError::InvalidVersion(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Vec<u64> ordering is segment-wise with shorter-is-less on a
        // common prefix, i.e. "1.0" < "1.0.1"
        self.segments.cmp(&other.segments)
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn numeric_not_lexical() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.2") < v("1.9"));
        let mut versions = vec![v("1.9"), v("1.10"), v("1.2")];
        versions.sort();
        let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(sorted, vec!["1.2", "1.9", "1.10"]);
    }

    #[test]
    fn equal_ignores_spelling() {
        assert_eq!(v("1.0"), v("1.00"));
        assert_ne!(v("1.0"), v("1.0.0"));
        assert!(v("1.0") < v("1.0.0"));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!("1.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
        assert!("1..2".parse::<Version>().is_err());
    }

    #[test]
    fn display_preserves_raw() {
        assert_eq!(v("1.00").to_string(), "1.00");
    }
}
