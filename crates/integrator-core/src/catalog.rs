//! Runtime catalogs and version resolution.
//!
//! A catalog describes one available runtime version together with the
//! capabilities of the endpoint schemes it ships. Resolution accepts either
//! a literal version (exact match) or a range expression such as
//! `>=1.0.0 <2.0.0 || ^3.1.0`, in which case the newest satisfying catalog
//! wins.

use crate::{Error, Result};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One available runtime catalog. Never mutated by resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub version: String,
    /// Capabilities keyed by endpoint scheme (`http`, `timer`, ...).
    #[serde(default)]
    pub schemes: BTreeMap<String, SchemeCapability>,
}

/// What an endpoint scheme needs from the platform when used as a consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeCapability {
    /// Consuming from this scheme exposes an HTTP service.
    #[serde(default)]
    pub http: bool,
    /// The consumer only reacts to incoming requests.
    #[serde(default)]
    pub passive: bool,
}

impl CatalogEntry {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            schemes: BTreeMap::new(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>, capability: SchemeCapability) -> Self {
        self.schemes.insert(scheme.into(), capability);
        self
    }

    pub fn scheme(&self, scheme: &str) -> Option<&SchemeCapability> {
        self.schemes.get(scheme)
    }
}

/// Resolve a version or range expression against a set of catalogs.
///
/// Returns `None` when nothing matches; absence of a match is a normal
/// outcome callers are expected to branch on.
pub fn resolve<'a>(version: &str, catalogs: &'a [CatalogEntry]) -> Option<&'a CatalogEntry> {
    match VersionRange::parse(version) {
        Ok(range) => find_best_semver_match(&range, catalogs),
        Err(e) => {
            debug!(constraint = %version, error = %e, "Not a version range, using exact match");
            find_exact_match(version, catalogs)
        }
    }
}

/// First catalog whose version string equals `version`.
pub fn find_exact_match<'a>(version: &str, catalogs: &'a [CatalogEntry]) -> Option<&'a CatalogEntry> {
    catalogs.iter().find(|c| c.version == version)
}

/// Newest catalog satisfying `range`. Catalogs whose version does not parse
/// are skipped.
pub fn find_best_semver_match<'a>(
    range: &VersionRange,
    catalogs: &'a [CatalogEntry],
) -> Option<&'a CatalogEntry> {
    let mut versions: Vec<(Version, &CatalogEntry)> = catalogs
        .iter()
        .filter_map(|catalog| match Version::parse(&catalog.version) {
            Ok(v) => Some((v, catalog)),
            Err(e) => {
                debug!(version = %catalog.version, error = %e, "Invalid semver version, skipping catalog");
                None
            }
        })
        .collect();

    // Stable: among equal versions the first declared catalog wins.
    versions.sort_by(|a, b| b.0.cmp(&a.0));

    versions
        .into_iter()
        .find(|(v, _)| range.matches(v))
        .map(|(_, catalog)| catalog)
}

/// A parsed range expression: alternatives separated by `||`, each a set of
/// whitespace-separated comparators that must all hold. A bare version means
/// equality and `!=`/`!` exclude one version; every other comparator is
/// handed to `semver`.
#[derive(Debug, Clone)]
pub struct VersionRange {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
struct Alternative {
    required: Option<VersionReq>,
    excluded: Vec<Version>,
}

const OPERATORS: &[&str] = &[">=", "<=", "!=", "==", ">", "<", "=", "!", "^", "~"];

impl VersionRange {
    pub fn parse(input: &str) -> Result<Self> {
        let alternatives = input
            .split("||")
            .map(|alternative| parse_alternative(alternative).ok_or_else(|| invalid_range(input)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|a| a.matches(version))
    }
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        !self.excluded.contains(version)
            && self.required.as_ref().is_none_or(|req| req.matches(version))
    }
}

fn parse_alternative(alternative: &str) -> Option<Alternative> {
    let mut comparators = Vec::new();
    let mut excluded = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alternative.split_whitespace() {
        // Allow `>= 1.0.0` as well as `>=1.0.0`.
        if OPERATORS.contains(&token) {
            if pending_op.replace(token).is_some() {
                return None;
            }
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        match token.strip_prefix("!=").or_else(|| token.strip_prefix('!')) {
            Some(version) => excluded.push(Version::parse(version).ok()?),
            None => comparators.push(normalize(&token)?),
        }
    }

    if pending_op.is_some() || (comparators.is_empty() && excluded.is_empty()) {
        return None;
    }
    let required = if comparators.is_empty() {
        None
    } else {
        Some(VersionReq::parse(&comparators.join(", ")).ok()?)
    };
    Some(Alternative { required, excluded })
}

/// Rewrite one comparator in `semver` requirement syntax.
fn normalize(token: &str) -> Option<String> {
    if token.starts_with(['^', '~']) {
        return Some(token.to_string());
    }
    let (op, version) = [">=", "<=", "==", ">", "<", "="]
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("=", token));
    // Plain comparators need a complete version.
    Version::parse(version).ok()?;
    Some(format!("{}{version}", if op == "==" { "=" } else { op }))
}

fn invalid_range(input: &str) -> Error {
    Error::InvalidInput(format!("not a version range: {input:?}"))
}
