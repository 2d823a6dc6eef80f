//! Publisher/package filter.
//!
//! `Publisher` matches every package whose publisher starts with the given
//! text; `Publisher/Package` additionally requires the package name to match
//! exactly. Both comparisons ignore case. The empty filter matches
//! everything.

use std::fmt;
use std::str::FromStr;

use crate::error::InvalidFilter;
use crate::types::PackageId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageFilter {
    /// Lowercased publisher prefix; empty matches every publisher.
    publisher: String,
    /// Lowercased exact package name.
    package: Option<String>,
}

impl PackageFilter {
    /// The filter that matches every package.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.publisher.is_empty() && self.package.is_none()
    }

    pub fn matches(&self, id: &PackageId) -> bool {
        if !id.publisher.to_lowercase().starts_with(&self.publisher) {
            return false;
        }
        match &self.package {
            Some(package) => id.name.to_lowercase() == *package,
            None => true,
        }
    }
}

impl FromStr for PackageFilter {
    type Err = InvalidFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (publisher, package) = match trimmed.split_once('/') {
            Some((publisher, package)) => (publisher.trim(), Some(package.trim())),
            None => (trimmed, None),
        };
        let package = package.filter(|p| !p.is_empty());
        if package.is_some_and(|p| p.contains('/')) || (publisher.is_empty() && package.is_some())
        {
            return Err(InvalidFilter(s.to_owned()));
        }
        Ok(Self {
            publisher: publisher.to_lowercase(),
            package: package.map(str::to_lowercase),
        })
    }
}

impl fmt::Display for PackageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{}/{}", self.publisher, package),
            None => self.publisher.fmt(f),
        }
    }
}
