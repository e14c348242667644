use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Series used by every bundle
pub const BUNDLE_SERIES: &str = "bundle";

/// Kind of a published artifact
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Charm,
    Bundle,
}

/// Error returned when an artifact reference cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid artifact reference {reference:?}: {reason}")]
pub struct ParseRefError {
    pub reference: String,
    pub reason: &'static str,
}

/// Fully qualified reference to one artifact revision:
/// `cs:~<owner>/<series>/<name>-<revision>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub owner: String,
    pub series: String,
    pub name: String,
    pub revision: u32,
}

impl ArtifactRef {
    pub fn new(
        owner: impl Into<String>,
        series: impl Into<String>,
        name: impl Into<String>,
        revision: u32,
    ) -> Self {
        Self {
            owner: owner.into(),
            series: series.into(),
            name: name.into(),
            revision,
        }
    }

    /// Revision-less key identifying the base entity in a given series.
    ///
    /// The index holds at most one document per key.
    pub fn base_key(&self) -> String {
        format!("~{}/{}/{}", self.owner, self.series, self.name)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cs:~{}/{}/{}-{}",
            self.owner, self.series, self.name, self.revision
        )
    }
}

impl FromStr for ArtifactRef {
    type Err = ParseRefError;

    /// Parses `[cs:]~owner/series/name-revision`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseRefError {
            reference: s.to_string(),
            reason,
        };

        let rest = s.strip_prefix("cs:").unwrap_or(s);
        let rest = rest.strip_prefix('~').ok_or_else(|| err("missing owner"))?;

        let mut parts = rest.splitn(3, '/');
        let owner = parts.next().filter(|p| !p.is_empty());
        let series = parts.next().filter(|p| !p.is_empty());
        let name_rev = parts.next().filter(|p| !p.is_empty());
        let (owner, series, name_rev) = match (owner, series, name_rev) {
            (Some(o), Some(s), Some(n)) => (o, s, n),
            _ => return Err(err("expected ~owner/series/name-revision")),
        };

        let (name, revision) = name_rev
            .rsplit_once('-')
            .ok_or_else(|| err("missing revision"))?;
        if name.is_empty() {
            return Err(err("empty name"));
        }
        let revision = revision.parse().map_err(|_| err("invalid revision"))?;

        Ok(Self::new(owner, series, name, revision))
    }
}

/// An artifact reference together with its promulgated revision, if the
/// artifact is also published under the unnamespaced alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedRef {
    pub url: ArtifactRef,
    pub promulgated_revision: Option<u32>,
}

impl ResolvedRef {
    pub fn new(url: ArtifactRef, promulgated_revision: Option<u32>) -> Self {
        Self {
            url,
            promulgated_revision,
        }
    }

    pub fn is_promulgated(&self) -> bool {
        self.promulgated_revision.is_some()
    }

    /// The id clients see: the promulgated alias when one exists.
    pub fn preferred_url(&self) -> String {
        match self.promulgated_revision {
            Some(rev) => format!("cs:{}/{}-{}", self.url.series, self.url.name, rev),
            None => self.url.to_string(),
        }
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preferred_url())
    }
}

/// Popularity signals known for an artifact.
///
/// `current` is the canonical counter; `legacy` is the value imported from
/// the old statistics store and is only consulted when `current` is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Popularity {
    pub current: Option<u64>,
    pub legacy: Option<u64>,
}

impl Popularity {
    pub fn current(count: u64) -> Self {
        Self {
            current: Some(count),
            legacy: None,
        }
    }

    pub fn total_downloads(&self) -> u64 {
        self.current.or(self.legacy).unwrap_or(0)
    }
}

/// Canonical record handed over by the primary store when an artifact is
/// published or its metadata changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ResolvedRef,
    pub kind: ArtifactKind,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Interface names the charm provides
    #[serde(default)]
    pub provides: Vec<String>,
    /// Interface names the charm requires
    #[serde(default)]
    pub requires: Vec<String>,
    /// Whether the revision appears in public listings
    pub listed: bool,
    #[serde(default)]
    pub popularity: Popularity,
}
