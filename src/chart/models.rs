use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identifier of a configured chart (e.g. "house-top-100").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartKey(String);

impl ChartKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keys end up in file names, so only `[A-Za-z0-9_-]+` is accepted.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A chart as configured in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub key: ChartKey,
    pub name: String,
    pub url: String,
}

impl ChartDefinition {
    pub fn new(key: &str, name: &str, url: &str) -> Self {
        Self {
            key: ChartKey::new(key),
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Identity of a track across weeks.
///
/// Derived from title, mix, artists and remixers after whitespace and case
/// normalization, so surface formatting drift between weeks does not split
/// one track into two.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn derive(
        title: &str,
        mix_name: Option<&str>,
        artists: &[String],
        remixers: &[String],
    ) -> Self {
        let canonical = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            normalize_field(title),
            mix_name.map(normalize_field).unwrap_or_default(),
            normalize_names(artists),
            normalize_names(remixers),
        );
        let digest = Sha256::digest(canonical.as_bytes());
        let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    /// Identity for entries that only carry the source site's track id,
    /// where title alone would merge distinct mixes.
    pub fn from_source(source_id: &str) -> Self {
        let canonical = format!("source\u{1f}{}", source_id.trim());
        let digest = Sha256::digest(canonical.as_bytes());
        let hex: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    /// Wraps an identity read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_field(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// Artist order on chart pages is not stable, so names are sorted.
fn normalize_names(names: &[String]) -> String {
    let mut normalized: Vec<String> = names
        .iter()
        .map(|n| normalize_field(n))
        .filter(|n| !n.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized.join(",")
}

/// One ranked row of a successful snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    /// 1-based position, unique within its snapshot.
    pub rank: u32,
    pub track_id: TrackId,
    pub title: String,
    pub mix_name: Option<String>,
    pub artists: Vec<String>,
    pub remixers: Vec<String>,
    pub url: Option<String>,
}

impl ChartEntry {
    pub fn new(
        rank: u32,
        title: &str,
        mix_name: Option<&str>,
        artists: Vec<String>,
        remixers: Vec<String>,
    ) -> Self {
        let track_id = TrackId::derive(title, mix_name, &artists, &remixers);
        Self {
            rank,
            track_id,
            title: title.trim().to_string(),
            mix_name: mix_name.map(|m| m.trim().to_string()),
            artists,
            remixers,
            url: None,
        }
    }

    pub fn with_track_id(mut self, track_id: TrackId) -> Self {
        self.track_id = track_id;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// "Artist A, Artist B - Title (Mix)" for logs and reports.
    pub fn display_name(&self) -> String {
        let mut out = String::new();
        if !self.artists.is_empty() {
            out.push_str(&self.artists.join(", "));
            out.push_str(" - ");
        }
        out.push_str(&self.title);
        if let Some(mix) = &self.mix_name {
            out.push_str(&format!(" ({})", mix));
        }
        out
    }
}
