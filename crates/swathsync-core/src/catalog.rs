//! Manifest client: lists the files expected for one bucket.
//!
//! The archive publishes a JSON listing next to each daily directory:
//! `GET <listing>.json` returns `{"content": [{"name": ..., "size": ...}, ...]}`.
//! Files are then fetched from `<listing>/<name>`.

use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::bucket::BucketKey;
use crate::config::SwathConfig;
use crate::http::{HttpClient, RequestIdentity};
use crate::retry::AttemptError;

/// One file the archive says should exist for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    /// Expected size in bytes.
    pub size: u64,
    pub url: String,
}

/// Listing for one bucket, in the order the archive returned it.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub listing_url: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a manifest could not be obtained. Every variant means "skip this bucket".
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid listing URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("listing request failed: {0}")]
    Transport(#[source] AttemptError),
    #[error("listing returned HTTP {0}")]
    Status(u32),
    #[error("listing body is not a valid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Pluggable source of manifests (URL scheme and authentication live here).
pub trait ManifestSource: Send + Sync + 'static {
    fn fetch_manifest(&self, key: &BucketKey) -> Result<Manifest, ManifestError>;
}

#[derive(Deserialize)]
struct Listing {
    content: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    name: String,
    size: SizeField,
}

/// The archive reports sizes as numbers or as numeric strings. Anything else
/// lands in `Other` so one odd entry cannot sink the whole listing.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl SizeField {
    fn bytes(&self) -> Option<u64> {
        match self {
            SizeField::Number(n) => Some(*n),
            SizeField::Float(f) => whole_bytes(*f),
            SizeField::Text(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| s.parse().ok().and_then(whole_bytes))
            }
            SizeField::Other(_) => None,
        }
    }
}

/// `100.0` is 100 bytes; fractional, negative or non-finite values are not sizes.
fn whole_bytes(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

/// A name is usable as a file name inside the bucket directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Parse a listing body. Entries with unusable names or sizes are dropped with a warning.
pub fn parse_listing(listing: &Url, body: &[u8]) -> Result<Manifest, ManifestError> {
    let parsed: Listing = serde_json::from_slice(body)?;
    let mut entries = Vec::with_capacity(parsed.content.len());
    for raw in parsed.content {
        if !is_plain_file_name(&raw.name) {
            tracing::warn!(name = %raw.name, "skipping manifest entry with unsafe name");
            continue;
        }
        let Some(size) = raw.size.bytes() else {
            tracing::warn!(name = %raw.name, "skipping manifest entry with unparsable size");
            continue;
        };
        let url = file_url(listing, &raw.name);
        entries.push(ManifestEntry {
            name: raw.name,
            size,
            url,
        });
    }
    Ok(Manifest {
        listing_url: listing.to_string(),
        entries,
    })
}

fn file_url(listing: &Url, name: &str) -> String {
    let mut url = listing.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push(name);
        }
        Err(()) => return format!("{}/{}", listing, name),
    }
    url.to_string()
}

/// Catalog for a LAADS-style archive: templated listing path plus bearer auth.
pub struct LadsCatalog<C> {
    client: Arc<C>,
    base_url: String,
    listing_template: String,
    identity: RequestIdentity,
}

impl<C: HttpClient> LadsCatalog<C> {
    pub fn new(
        client: Arc<C>,
        base_url: impl Into<String>,
        listing_template: impl Into<String>,
        identity: RequestIdentity,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            listing_template: listing_template.into(),
            identity,
        }
    }

    pub fn from_config(cfg: &SwathConfig, client: Arc<C>) -> Self {
        Self::new(
            client,
            cfg.base_url.clone(),
            cfg.listing_template.clone(),
            RequestIdentity::new(cfg.user_agent.clone(), cfg.resolved_token()),
        )
    }

    /// Listing directory URL for `key`, with the path percent-encoded.
    pub fn listing_url(&self, key: &BucketKey) -> Result<Url, ManifestError> {
        let path = self
            .listing_template
            .replace("{product}", key.product())
            .replace("{year}", &key.year())
            .replace("{doy}", &key.day_of_year());
        let mut url = Url::parse(&self.base_url)?;
        let full = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(full.trim_end_matches('/'));
        Ok(url)
    }
}

impl<C: HttpClient> ManifestSource for LadsCatalog<C> {
    fn fetch_manifest(&self, key: &BucketKey) -> Result<Manifest, ManifestError> {
        let listing = self.listing_url(key)?;
        let mut json_url = listing.clone();
        json_url.set_path(&format!("{}.json", listing.path()));

        tracing::debug!(bucket = %key, url = %json_url, "fetching manifest");
        let response = self
            .client
            .get(json_url.as_str(), &self.identity)
            .map_err(ManifestError::Transport)?;
        if response.status != 200 {
            return Err(ManifestError::Status(response.status));
        }
        parse_listing(&listing, &response.body)
    }
}
