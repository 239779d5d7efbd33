use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur parsing a coherence policy's external form.
/// A malformed policy is a fatal configuration error: it is raised at
/// creation time, before any proxy or shadow is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoherenceParseError {
    #[error("Unrecognized coherence policy external form: {form}")]
    UnrecognizedForm { form: String },

    #[error("Invalid interval in coherence policy external form: {form}")]
    InvalidInterval { form: String },
}

/// Desired freshness mode for a replica relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreshnessMode {
    /// The partner pushes every change as it happens; no polling
    PushImmediate,
    /// Poll the partner whenever the lease of this length has expired
    PollAtInterval {
        /// Lease length in milliseconds
        interval_millis: u64,
    },
    /// Fetch once at creation, never refresh again
    OneTimeSnapshot,
    /// Refresh only when a caller explicitly demands freshness, blocking
    /// until confirmed
    OnDemandOnly,
}

/// Declares the freshness requirements of a replica relationship.
/// Immutable value object, attached to a Proxy or Shadow at creation and
/// consulted on every refresh decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherencePolicy {
    pub mode: FreshnessMode,
    /// Whether probe fetches may follow a redirect to another source
    pub follow_redirects: bool,
}

impl CoherencePolicy {
    pub fn push_immediate() -> Self {
        Self {
            mode: FreshnessMode::PushImmediate,
            follow_redirects: false,
        }
    }

    pub fn poll_at_interval(interval: Duration) -> Self {
        Self {
            mode: FreshnessMode::PollAtInterval {
                interval_millis: interval.as_millis() as u64,
            },
            follow_redirects: false,
        }
    }

    pub fn one_time_snapshot() -> Self {
        Self {
            mode: FreshnessMode::OneTimeSnapshot,
            follow_redirects: false,
        }
    }

    pub fn on_demand_only() -> Self {
        Self {
            mode: FreshnessMode::OnDemandOnly,
            follow_redirects: false,
        }
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Polling interval, if the mode has one
    pub fn interval(&self) -> Option<Duration> {
        match self.mode {
            FreshnessMode::PollAtInterval { interval_millis } => {
                Some(Duration::from_millis(interval_millis))
            }
            _ => None,
        }
    }

    /// Serializes the policy to its external form, e.g.
    /// `poll:60000;redirects` or `push`
    pub fn to_external_form(&self) -> String {
        let mode = match self.mode {
            FreshnessMode::PushImmediate => "push".to_string(),
            FreshnessMode::PollAtInterval { interval_millis } => format!("poll:{interval_millis}"),
            FreshnessMode::OneTimeSnapshot => "one-time".to_string(),
            FreshnessMode::OnDemandOnly => "on-demand".to_string(),
        };
        if self.follow_redirects {
            format!("{mode};redirects")
        } else {
            mode
        }
    }

    /// Parses a policy from its external form
    pub fn from_external_form(form: &str) -> Result<Self, CoherenceParseError> {
        let (mode_part, follow_redirects) = match form.strip_suffix(";redirects") {
            Some(prefix) => (prefix, true),
            None => (form, false),
        };

        let mode = if mode_part == "push" {
            FreshnessMode::PushImmediate
        } else if mode_part == "one-time" {
            FreshnessMode::OneTimeSnapshot
        } else if mode_part == "on-demand" {
            FreshnessMode::OnDemandOnly
        } else if let Some(interval) = mode_part.strip_prefix("poll:") {
            let interval_millis =
                interval
                    .parse::<u64>()
                    .map_err(|_| CoherenceParseError::InvalidInterval {
                        form: form.to_string(),
                    })?;
            FreshnessMode::PollAtInterval { interval_millis }
        } else {
            return Err(CoherenceParseError::UnrecognizedForm {
                form: form.to_string(),
            });
        };

        Ok(Self {
            mode,
            follow_redirects,
        })
    }
}

// Display is the external form, so logs and persisted state agree
impl fmt::Display for CoherencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_external_form())
    }
}
