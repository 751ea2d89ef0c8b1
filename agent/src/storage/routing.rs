//! svnwcsub routing table
//!
//! Maps svn URL prefixes to the working copies that track them. The file is
//! INI-shaped:
//!
//! ```ini
//! [DEFAULT]
//! ASF: https://svn-master.apache.org/repos/asf
//!
//! [track]
//! /www/commons.apache.org/content: %(ASF)s/commons/cms-site/trunk/content
//! ```
//!
//! Keys of `[DEFAULT]` are visible in every section and usable through
//! `%(name)s` interpolation.

use ini::{Ini, Properties};
use tracing::{debug, info};

use crate::errors::SyncError;
use crate::filesys::file::File;

const TRACK_SECTION: &str = "track";
const DEFAULT_SECTION: &str = "DEFAULT";
const MAX_INTERPOLATION_DEPTH: usize = 10;

/// One tracked working copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Local working copy
    pub target: String,

    /// svn URL prefix whose commits update the target
    pub url_prefix: String,
}

/// Read-only lookup table built once at startup
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    pub fn new(entries: Vec<RoutingEntry>) -> Self {
        Self { entries }
    }

    /// Load the table from a file; a missing file yields an empty table
    pub async fn load(file: &File) -> Result<Self, SyncError> {
        if !file.exists().await {
            info!("No routing file at {}, svn commits will be ignored", file.path().display());
            return Ok(Self::default());
        }
        let contents = file.read_string().await?;
        let table = Self::parse(&contents)?;
        info!("Loaded {} svn routing entries from {}", table.len(), file.path().display());
        Ok(table)
    }

    /// Parse the `[track]` section. Entries whose target is not an absolute
    /// path (such as inherited `[DEFAULT]` values) are skipped.
    pub fn parse(contents: &str) -> Result<Self, SyncError> {
        let (defaults, track) = parse_ini(contents)?;
        let Some(track) = track else {
            return Ok(Self::default());
        };

        let mut entries = Vec::new();
        for (key, raw) in merged(&defaults, &track) {
            if !key.starts_with('/') {
                debug!("Skipping non-site routing entry {}", key);
                continue;
            }
            let url_prefix = interpolate(&raw, &track, &defaults)?;
            entries.push(RoutingEntry {
                target: key,
                url_prefix,
            });
        }
        Ok(Self { entries })
    }

    /// Last entry, in file order, whose prefix matches `url`
    pub fn lookup(&self, url: &str) -> Option<&RoutingEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| url.starts_with(&entry.url_prefix))
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered `(key, value)` pairs of one section
type Pairs = Vec<(String, String)>;

/// Read the `[DEFAULT]` and `[track]` sections. A repeated key keeps its
/// last value.
fn parse_ini(contents: &str) -> Result<(Pairs, Option<Pairs>), SyncError> {
    let ini = Ini::load_from_str_noescape(contents)
        .map_err(|e| SyncError::ConfigError(format!("invalid routing file: {e}")))?;

    if let Some((key, _)) = ini.general_section().iter().next() {
        return Err(SyncError::ConfigError(format!(
            "routing entry {key} outside of any section"
        )));
    }

    let defaults = ini.section(Some(DEFAULT_SECTION)).map(pairs).unwrap_or_default();
    let track = ini.section(Some(TRACK_SECTION)).map(pairs);
    Ok((defaults, track))
}

fn pairs(properties: &Properties) -> Pairs {
    let mut out: Pairs = Vec::new();
    for (key, value) in properties.iter() {
        match out.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value.to_string(),
            None => out.push((key.to_string(), value.to_string())),
        }
    }
    out
}

/// Section entries with defaults filled in; section values win
fn merged(defaults: &[(String, String)], section: &[(String, String)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = defaults
        .iter()
        .filter(|(key, _)| !section.iter().any(|(k, _)| k == key))
        .cloned()
        .collect();
    out.extend(section.iter().cloned());
    out
}

fn interpolate(
    value: &str,
    section: &[(String, String)],
    defaults: &[(String, String)],
) -> Result<String, SyncError> {
    let mut current = value.to_string();
    for _ in 0..MAX_INTERPOLATION_DEPTH {
        if !current.contains("%(") {
            return Ok(current.replace("%%", "%"));
        }
        let mut out = String::with_capacity(current.len());
        let mut rest = current.as_str();
        while let Some(start) = rest.find("%(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find(")s") else {
                return Err(SyncError::ConfigError(format!("bad interpolation in `{value}`")));
            };
            let name = &after[..end];
            let replacement = find_ci(section, name)
                .or_else(|| find_ci(defaults, name))
                .ok_or_else(|| {
                    SyncError::ConfigError(format!("unknown interpolation key `{name}` in `{value}`"))
                })?;
            out.push_str(replacement);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        current = out;
    }
    Err(SyncError::ConfigError(format!("interpolation too deep in `{value}`")))
}

fn find_ci<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
