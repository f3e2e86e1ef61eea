//! Per-learner runtime state
//!
//! One [`RuntimeState`] exists per (learner, block) pair. It holds the raw CMI
//! key/value echo the player reads back, plus the canonical status and score
//! derived from commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::cmi::ProtocolVersion;
use crate::error::Error;

/// Canonical completion status, independent of protocol version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScormStatus {
    #[default]
    Unattended,
    InProgress,
    Succeeded,
    Failed,
}

impl ScormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScormStatus::Unattended => "UNATTENDED",
            ScormStatus::InProgress => "IN_PROGRESS",
            ScormStatus::Succeeded => "SUCCEEDED",
            ScormStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ScormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScormStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNATTENDED" => Ok(ScormStatus::Unattended),
            "IN_PROGRESS" => Ok(ScormStatus::InProgress),
            "SUCCEEDED" => Ok(ScormStatus::Succeeded),
            "FAILED" => Ok(ScormStatus::Failed),
            other => Err(Error::Common(scorm_common::Error::Internal(format!(
                "Unknown stored status: {}",
                other
            )))),
        }
    }
}

/// Mutable runtime record for one learner in one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    /// Raw CMI elements as last written by the player
    pub cmi_data: HashMap<String, String>,
    /// Time of the last commit; `None` until the first one
    pub modified_at: Option<DateTime<Utc>>,
    pub status: ScormStatus,
    /// Canonical score in [0, 1]
    pub score: f64,
}

impl RuntimeState {
    /// Stored value of `element`, or `default` when never written
    pub fn read<'a>(&'a self, element: &str, default: &'a str) -> &'a str {
        self.cmi_data.get(element).map(String::as_str).unwrap_or(default)
    }

    /// Merge `payload` into the CMI map (last write wins per key)
    pub fn apply_commit(&mut self, payload: &HashMap<String, String>, now: DateTime<Utc>) {
        self.cmi_data
            .extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.modified_at = Some(now);
    }

    /// Record a visit without changing CMI data
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.modified_at = Some(now);
    }

    /// Drop the raw CMI echo. Status and score are left alone.
    pub fn reset(&mut self) {
        self.cmi_data.clear();
    }

    pub fn has_submitted(&self) -> bool {
        self.status != ScormStatus::Unattended
    }

    /// Learner progress in [0, 1]
    ///
    /// Only SCORM 2004 reports progress (`cmi.progress_measure`); anything
    /// unparseable counts as no progress.
    pub fn progress(&self, version: ProtocolVersion) -> f64 {
        match version {
            ProtocolVersion::Scorm12 => 0.0,
            ProtocolVersion::Scorm2004 => self
                .cmi_data
                .get("cmi.progress_measure")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, 1.0))
                .unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_new_state_is_unattended() {
        let state = RuntimeState::default();
        assert_eq!(state.status, ScormStatus::Unattended);
        assert!(!state.has_submitted());
        assert_eq!(state.score, 0.0);
        assert!(state.modified_at.is_none());
    }

    #[test]
    fn test_read_falls_back_to_default() {
        let state = RuntimeState::default();
        assert_eq!(state.read("cmi.core.lesson_status", "not attempted"), "not attempted");
    }

    #[test]
    fn test_apply_commit_is_last_write_wins() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut state = RuntimeState::default();
        state.apply_commit(&payload(&[("cmi.suspend_data", "a"), ("cmi.location", "p1")]), t);
        state.apply_commit(&payload(&[("cmi.suspend_data", "b")]), t);

        assert_eq!(state.read("cmi.suspend_data", ""), "b");
        assert_eq!(state.read("cmi.location", ""), "p1");
        assert_eq!(state.modified_at, Some(t));
    }

    #[test]
    fn test_reset_keeps_canonical_progress() {
        let mut state = RuntimeState {
            status: ScormStatus::Succeeded,
            score: 0.9,
            ..Default::default()
        };
        state.apply_commit(&payload(&[("cmi.suspend_data", "x")]), Utc::now());
        state.reset();

        assert!(state.cmi_data.is_empty());
        assert_eq!(state.status, ScormStatus::Succeeded);
        assert_eq!(state.score, 0.9);
    }

    #[test]
    fn test_progress_only_for_2004() {
        let mut state = RuntimeState::default();
        state.apply_commit(&payload(&[("cmi.progress_measure", "0.4")]), Utc::now());

        assert_eq!(state.progress(ProtocolVersion::Scorm2004), 0.4);
        assert_eq!(state.progress(ProtocolVersion::Scorm12), 0.0);
    }

    #[test]
    fn test_progress_ignores_garbage() {
        let mut state = RuntimeState::default();
        state.apply_commit(&payload(&[("cmi.progress_measure", "most")]), Utc::now());
        assert_eq!(state.progress(ProtocolVersion::Scorm2004), 0.0);
    }

    #[test]
    fn test_status_storage_names_round_trip() {
        for status in [
            ScormStatus::Unattended,
            ScormStatus::InProgress,
            ScormStatus::Succeeded,
            ScormStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ScormStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<ScormStatus>().is_err());
    }
}
