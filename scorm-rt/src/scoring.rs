//! Score normalization
//!
//! Maps the version-specific score and status elements of a commit payload
//! onto one canonical `{status, earned, possible}` triple. Only the fields of
//! the payload itself are inspected, never the merged runtime state.

use std::collections::HashMap;

use crate::cmi::ProtocolVersion;
use crate::error::{Error, Result};
use crate::state::ScormStatus;

/// Raw score expressed as points earned out of points possible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScore {
    earned: f64,
    possible: f64,
}

impl RawScore {
    /// Score from a `raw/min/max` triple; `max` must be above `min`
    pub fn from_range(raw: f64, min: f64, max: f64) -> Result<Self> {
        let possible = max - min;
        if possible <= 0.0 {
            return Err(Error::InvalidScoreRange { min, max });
        }
        Ok(Self {
            earned: raw - min,
            possible,
        })
    }

    /// Score from a SCORM 2004 scaled value (already out of 1)
    pub fn from_scaled(scaled: f64) -> Self {
        Self {
            earned: scaled,
            possible: 1.0,
        }
    }

    pub fn earned(&self) -> f64 {
        self.earned
    }

    pub fn possible(&self) -> f64 {
        self.possible
    }

    /// `earned / possible`; never NaN since `possible` is positive
    pub fn ratio(&self) -> f64 {
        self.earned / self.possible
    }
}

/// Canonical result of normalizing one commit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub status: ScormStatus,
    /// `None` when the commit reported a status but no score
    pub score: Option<RawScore>,
}

type Extractor = fn(&HashMap<String, String>) -> Result<Option<Normalized>>;

/// Per-version extraction strategies
const EXTRACTORS: &[(ProtocolVersion, Extractor)] = &[
    (ProtocolVersion::Scorm12, extract_12),
    (ProtocolVersion::Scorm2004, extract_2004),
];

/// Normalize a commit payload
///
/// Returns `Ok(None)` when the payload carries neither score nor status
/// elements. Non-numeric score fields fail with `MalformedCommitPayload`, a
/// zero-width or inverted range with `InvalidScoreRange`.
pub fn normalize(payload: &HashMap<String, String>, version: ProtocolVersion) -> Result<Option<Normalized>> {
    let extract = EXTRACTORS
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, extract)| *extract)
        .ok_or_else(|| Error::InvalidVersion(version.to_string()))?;
    extract(payload)
}

/// SCORM 1.2: `cmi.core.score.*` and `cmi.core.lesson_status`
pub fn extract_12(payload: &HashMap<String, String>) -> Result<Option<Normalized>> {
    let score = match number(payload, "cmi.core.score.raw")? {
        Some(raw) => {
            let min = number(payload, "cmi.core.score.min")?.unwrap_or(0.0);
            let max = number(payload, "cmi.core.score.max")?.unwrap_or(1.0);
            Some(RawScore::from_range(raw, min, max)?)
        }
        None => None,
    };

    let lesson_status = payload.get("cmi.core.lesson_status");
    if score.is_none() && lesson_status.is_none() {
        return Ok(None);
    }

    Ok(Some(Normalized {
        status: status_from(lesson_status),
        score,
    }))
}

/// SCORM 2004: `cmi.score.*` and `cmi.success_status`
///
/// A complete `raw/min/max` triple wins over `cmi.score.scaled`.
pub fn extract_2004(payload: &HashMap<String, String>) -> Result<Option<Normalized>> {
    let raw = number(payload, "cmi.score.raw")?;
    let min = number(payload, "cmi.score.min")?;
    let max = number(payload, "cmi.score.max")?;

    let score = match (raw, min, max) {
        (Some(raw), Some(min), Some(max)) => Some(RawScore::from_range(raw, min, max)?),
        _ => number(payload, "cmi.score.scaled")?.map(RawScore::from_scaled),
    };

    let success_status = payload.get("cmi.success_status");
    if score.is_none() && success_status.is_none() {
        return Ok(None);
    }

    Ok(Some(Normalized {
        status: status_from(success_status),
        score,
    }))
}

fn status_from(reported: Option<&String>) -> ScormStatus {
    match reported.map(String::as_str) {
        Some("passed") => ScormStatus::Succeeded,
        Some("failed") => ScormStatus::Failed,
        _ => ScormStatus::InProgress,
    }
}

/// Parse a numeric CMI element; empty means unset
fn number(payload: &HashMap<String, String>, field: &str) -> Result<Option<f64>> {
    let value = match payload.get(field) {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Ok(None),
    };
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(Error::MalformedCommitPayload {
            field: field.to_string(),
            value: value.clone(),
        }),
    }
}

/// Scoring capability of a block's learner record
///
/// The reconciliation engine grades through this interface only.
pub trait Scorable {
    /// Score a perfect attempt is worth
    fn max_score(&self) -> f64;

    /// Whether a learner with a recorded attempt may be scored again
    fn allows_rescore(&self) -> bool;

    fn has_submitted(&self) -> bool;

    /// Record a new attempt; status and score always change together
    fn set_score(&mut self, score: &RawScore, status: ScormStatus);

    /// Current canonical score
    fn score(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_scorm12_raw_min_max() {
        let result = normalize(
            &payload(&[
                ("cmi.core.score.raw", "50"),
                ("cmi.core.score.min", "0"),
                ("cmi.core.score.max", "100"),
            ]),
            ProtocolVersion::Scorm12,
        )
        .unwrap()
        .unwrap();

        let score = result.score.unwrap();
        assert_eq!(score.earned(), 50.0);
        assert_eq!(score.possible(), 100.0);
        assert_eq!(score.ratio(), 0.5);
        assert_eq!(result.status, ScormStatus::InProgress);
    }

    #[test]
    fn test_scorm12_min_max_default_to_unit_range() {
        let result = extract_12(&payload(&[("cmi.core.score.raw", "0.75")])).unwrap().unwrap();
        assert_eq!(result.score.unwrap().ratio(), 0.75);
    }

    #[test]
    fn test_scorm12_status_mapping() {
        let cases = [
            ("passed", ScormStatus::Succeeded),
            ("failed", ScormStatus::Failed),
            ("completed", ScormStatus::InProgress),
            ("incomplete", ScormStatus::InProgress),
        ];
        for (reported, expected) in cases {
            let result = extract_12(&payload(&[("cmi.core.lesson_status", reported)]))
                .unwrap()
                .unwrap();
            assert_eq!(result.status, expected, "lesson_status {}", reported);
            assert!(result.score.is_none());
        }
    }

    #[test]
    fn test_scorm2004_scaled_fallback() {
        let result = normalize(&payload(&[("cmi.score.scaled", "0.5")]), ProtocolVersion::Scorm2004)
            .unwrap()
            .unwrap();
        assert_eq!(result.score.unwrap().ratio(), 0.5);
    }

    #[test]
    fn test_scorm2004_triple_preferred_over_scaled() {
        let result = extract_2004(&payload(&[
            ("cmi.score.raw", "8"),
            ("cmi.score.min", "0"),
            ("cmi.score.max", "10"),
            ("cmi.score.scaled", "0.1"),
            ("cmi.success_status", "passed"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(result.score.unwrap().ratio(), 0.8);
        assert_eq!(result.status, ScormStatus::Succeeded);
    }

    #[test]
    fn test_scorm2004_partial_triple_uses_scaled() {
        let result = extract_2004(&payload(&[("cmi.score.raw", "8"), ("cmi.score.scaled", "0.3")]))
            .unwrap()
            .unwrap();
        assert_eq!(result.score.unwrap().ratio(), 0.3);
    }

    #[test]
    fn test_scorm2004_failed_status() {
        let result = extract_2004(&payload(&[("cmi.success_status", "failed")])).unwrap().unwrap();
        assert_eq!(result.status, ScormStatus::Failed);
    }

    #[test]
    fn test_versions_agree_on_half_score() {
        let v12 = normalize(
            &payload(&[
                ("cmi.core.score.raw", "50"),
                ("cmi.core.score.min", "0"),
                ("cmi.core.score.max", "100"),
            ]),
            ProtocolVersion::Scorm12,
        )
        .unwrap()
        .unwrap();
        let v2004 = normalize(&payload(&[("cmi.score.scaled", "0.5")]), ProtocolVersion::Scorm2004)
            .unwrap()
            .unwrap();

        assert_eq!(v12.score.unwrap().ratio(), v2004.score.unwrap().ratio());
    }

    #[test]
    fn test_no_score_fields_is_none() {
        let data = payload(&[("cmi.suspend_data", "abc"), ("cmi.core.lesson_location", "3")]);
        assert_eq!(normalize(&data, ProtocolVersion::Scorm12).unwrap(), None);
        assert_eq!(normalize(&data, ProtocolVersion::Scorm2004).unwrap(), None);
    }

    #[test]
    fn test_other_version_fields_ignored() {
        let data = payload(&[("cmi.score.scaled", "0.9")]);
        assert_eq!(normalize(&data, ProtocolVersion::Scorm12).unwrap(), None);
    }

    #[test]
    fn test_zero_width_range_is_error() {
        let result = extract_12(&payload(&[
            ("cmi.core.score.raw", "5"),
            ("cmi.core.score.min", "5"),
            ("cmi.core.score.max", "5"),
        ]));
        assert!(matches!(result, Err(Error::InvalidScoreRange { .. })));
    }

    #[test]
    fn test_inverted_range_is_error() {
        assert!(matches!(
            RawScore::from_range(50.0, 100.0, 0.0),
            Err(Error::InvalidScoreRange { min, max }) if min == 100.0 && max == 0.0
        ));

        let result = extract_2004(&payload(&[
            ("cmi.score.raw", "3"),
            ("cmi.score.min", "10"),
            ("cmi.score.max", "1"),
        ]));
        assert!(matches!(result, Err(Error::InvalidScoreRange { .. })));
    }

    #[test]
    fn test_non_numeric_is_malformed() {
        let result = extract_12(&payload(&[("cmi.core.score.raw", "eighty")]));
        match result {
            Err(Error::MalformedCommitPayload { field, value }) => {
                assert_eq!(field, "cmi.core.score.raw");
                assert_eq!(value, "eighty");
            }
            other => panic!("expected MalformedCommitPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_is_malformed() {
        for bad in ["NaN", "inf", "-infinity"] {
            let result = extract_2004(&payload(&[("cmi.score.scaled", bad)]));
            assert!(matches!(result, Err(Error::MalformedCommitPayload { .. })), "{}", bad);
        }
    }

    #[test]
    fn test_empty_score_field_is_unset() {
        let result = extract_12(&payload(&[("cmi.core.score.raw", "")])).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_ratio_in_unit_interval_within_range() {
        for (raw, min, max) in [(0.0, 0.0, 10.0), (10.0, 0.0, 10.0), (-3.0, -5.0, 5.0), (42.0, 40.0, 60.0)] {
            let ratio = RawScore::from_range(raw, min, max).unwrap().ratio();
            assert!((0.0..=1.0).contains(&ratio), "{} in [{}, {}] gave {}", raw, min, max, ratio);
        }
    }
}
