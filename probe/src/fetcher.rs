use std::fmt;

use thiserror::Error;

use meshsync_shared::ChangeRecord;

/// Identifies an external data source, e.g. `file:///data/team.json` or
/// `http://example.org/graph`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for SourceId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// What a fetch brought back. A redirect target means the source has
/// moved; whether to follow is the coherence policy's decision, not the
/// fetcher's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub redirect: Option<SourceId>,
}

impl RawContent {
    pub fn of(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: None,
            redirect: None,
        }
    }

    pub fn redirect_to(target: SourceId) -> Self {
        Self {
            bytes: Vec::new(),
            content_type: None,
            redirect: Some(target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
}

/// Retrieves raw content from external sources. One fetcher typically
/// handles one scheme; `supports` is what the registry dispatches on.
pub trait SourceFetcher: Send + Sync {
    fn supports(&self, source: &SourceId) -> bool;

    fn fetch(&self, source: &SourceId) -> Result<RawContent, FetchError>;
}

/// Turns fetched content into graph change records relative to the
/// shadow's current replica
pub trait ContentParser: Send + Sync {
    fn parse(&self, content: &RawContent) -> Result<Vec<ChangeRecord>, ParseError>;
}
