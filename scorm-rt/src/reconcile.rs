//! Reconciliation of learner runtime state against the current package
//!
//! Every read and write from the player carries the package timestamp the
//! page was rendered with. Comparing it, and the record's own last commit,
//! against the block's current package decides whether stored CMI data still
//! belongs to the content the learner is looking at.
//!
//! | state               | expired | allow update |
//! |---------------------|---------|--------------|
//! | `Current`           | no      | yes          |
//! | `StaleFrozen`       | yes     | no           |
//! | `StaleRefreshable`  | yes     | yes          |

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::cmi::{self, ProtocolVersion};
use crate::error::Result;
use crate::package::PackageDescriptor;
use crate::scoring::{self, RawScore, Scorable};
use crate::state::{RuntimeState, ScormStatus};

/// Staleness of a learner record relative to the block's package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Stored data matches the current package (or there is no package)
    Current,
    /// The player is still showing a package that has since been replaced
    StaleFrozen,
    /// The player shows the new package but stored data predates it
    StaleRefreshable,
}

impl Staleness {
    /// Classify a request
    ///
    /// `client_package` is the package timestamp the player echoed back,
    /// `runtime_modified` the record's last commit.
    pub fn classify(
        package_modified: Option<DateTime<Utc>>,
        client_package: Option<DateTime<Utc>>,
        runtime_modified: Option<DateTime<Utc>>,
    ) -> Self {
        let Some(package_modified) = package_modified else {
            return Staleness::Current;
        };
        match (client_package, runtime_modified) {
            (Some(client), _) if client < package_modified => Staleness::StaleFrozen,
            (_, Some(modified)) if modified < package_modified => Staleness::StaleRefreshable,
            _ => Staleness::Current,
        }
    }

    /// Stored CMI data must not be shown or kept
    pub fn expired(&self) -> bool {
        !matches!(self, Staleness::Current)
    }

    /// The commit payload may be stored
    pub fn allow_update(&self) -> bool {
        !matches!(self, Staleness::StaleFrozen)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Staleness::Current => "current",
            Staleness::StaleFrozen => "stale_frozen",
            Staleness::StaleRefreshable => "stale_refreshable",
        };
        f.write_str(name)
    }
}

/// Block-level grading settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingPolicy {
    pub allow_rescore: bool,
    pub max_score: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            allow_rescore: true,
            max_score: 1.0,
        }
    }
}

/// A learner's runtime state seen through the block's grading policy
pub struct LearnerRecord<'a> {
    state: &'a mut RuntimeState,
    policy: GradingPolicy,
}

impl<'a> LearnerRecord<'a> {
    pub fn new(state: &'a mut RuntimeState, policy: GradingPolicy) -> Self {
        Self { state, policy }
    }

    pub fn state(&self) -> &RuntimeState {
        self.state
    }
}

impl Scorable for LearnerRecord<'_> {
    fn max_score(&self) -> f64 {
        self.policy.max_score
    }

    fn allows_rescore(&self) -> bool {
        self.policy.allow_rescore
    }

    fn has_submitted(&self) -> bool {
        self.state.has_submitted()
    }

    fn set_score(&mut self, score: &RawScore, status: ScormStatus) {
        let max_score = self.max_score();
        let scaled = max_score * score.ratio();
        let clamped = scaled.clamp(0.0, max_score);
        if clamped != scaled {
            warn!(
                earned = score.earned(),
                possible = score.possible(),
                clamped,
                "Reported score outside its own range, clamping"
            );
        }
        self.state.score = clamped;
        self.state.status = status;
    }

    fn score(&self) -> f64 {
        self.state.score
    }
}

/// Result of one commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub status: ScormStatus,
    pub score: f64,
    pub staleness: Staleness,
    /// A new score was recorded and must be published to the host
    pub graded: bool,
}

/// Decides get/commit behavior for one block's current package
pub struct ReconciliationEngine<'a> {
    package: Option<&'a PackageDescriptor>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(package: Option<&'a PackageDescriptor>) -> Self {
        Self { package }
    }

    pub fn classify(
        &self,
        client_package: Option<DateTime<Utc>>,
        runtime_modified: Option<DateTime<Utc>>,
    ) -> Staleness {
        Staleness::classify(
            self.package.map(|p| p.modified_at),
            client_package,
            runtime_modified,
        )
    }

    /// Value the player should see for `element`
    ///
    /// `state` is `None` for a learner who has never committed. A player
    /// still showing a replaced package only ever sees defaults.
    pub fn get_value(
        &self,
        state: Option<&RuntimeState>,
        element: &str,
        version: ProtocolVersion,
        client_package: Option<DateTime<Utc>>,
    ) -> String {
        let default = self.default_for(element, version);
        let staleness = self.classify(client_package, state.and_then(|s| s.modified_at));

        match (staleness, state) {
            (Staleness::StaleFrozen, _) | (_, None) => default.to_string(),
            (_, Some(state)) => state.read(element, default).to_string(),
        }
    }

    /// Apply one commit payload to a learner record
    ///
    /// The payload is validated before anything is touched, so an error
    /// leaves the record exactly as it was.
    pub fn commit(
        &self,
        record: &mut LearnerRecord<'_>,
        payload: &HashMap<String, String>,
        version: ProtocolVersion,
        client_package: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome> {
        let normalized = scoring::normalize(payload, version)?;
        let staleness = self.classify(client_package, record.state.modified_at);

        if staleness.expired() {
            record.state.reset();
        }
        if staleness.allow_update() {
            record.state.apply_commit(payload, now);
        } else {
            record.state.touch(now);
            debug!(%staleness, "Commit from replaced package, payload discarded");
        }

        let mut graded = false;
        if staleness.allow_update() {
            if let Some(scoring::Normalized {
                status,
                score: Some(score),
            }) = normalized
            {
                if !record.has_submitted() || record.allows_rescore() {
                    record.set_score(&score, status);
                    graded = true;
                } else {
                    debug!("Rescore not allowed, keeping first attempt");
                }
            }
        }

        Ok(CommitOutcome {
            status: record.state.status,
            score: record.score(),
            staleness,
            graded,
        })
    }

    fn default_for(&self, element: &str, version: ProtocolVersion) -> &'a str {
        if element == cmi::LAUNCH_DATA {
            if let Some(data) = self.package.and_then(|p| p.launch_data.as_deref()) {
                return data;
            }
        }
        cmi::default_value(version, element)
    }
}
