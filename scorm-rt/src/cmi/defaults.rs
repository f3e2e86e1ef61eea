//! Default values for CMI data model elements the learner has not set yet
//!
//! Values follow the SCORM 1.2 and SCORM 2004 (4th edition) run-time
//! environment books. Elements missing from a table default to the empty
//! string.

use super::ProtocolVersion;

/// SCORM 1.2 run-time defaults
pub const SCORM_12_DEFAULTS: &[(&str, &str)] = &[
    ("cmi._children", "core,suspend_data,launch_data,comments,objectives,student_data,student_preference,interactions"),
    ("cmi.core._children", "student_id,student_name,lesson_location,credit,lesson_status,entry,score,total_time,lesson_mode,exit,session_time"),
    ("cmi.core.student_id", ""),
    ("cmi.core.student_name", ""),
    ("cmi.core.lesson_location", ""),
    ("cmi.core.credit", "credit"),
    ("cmi.core.lesson_status", "not attempted"),
    ("cmi.core.entry", "ab-initio"),
    ("cmi.core.score._children", "raw,min,max"),
    ("cmi.core.score.raw", ""),
    ("cmi.core.score.min", ""),
    ("cmi.core.score.max", ""),
    ("cmi.core.total_time", "0000:00:00.00"),
    ("cmi.core.lesson_mode", "normal"),
    ("cmi.core.exit", ""),
    ("cmi.core.session_time", "0000:00:00.00"),
    ("cmi.suspend_data", ""),
    ("cmi.launch_data", ""),
    ("cmi.comments", ""),
    ("cmi.comments_from_lms", ""),
    ("cmi.objectives._children", "id,score,status"),
    ("cmi.objectives._count", "0"),
    ("cmi.student_data._children", "mastery_score,max_time_allowed,time_limit_action"),
    ("cmi.student_data.mastery_score", ""),
    ("cmi.student_data.max_time_allowed", ""),
    ("cmi.student_data.time_limit_action", "continue,no message"),
    ("cmi.student_preference._children", "audio,language,speed,text"),
    ("cmi.student_preference.audio", "0"),
    ("cmi.student_preference.language", ""),
    ("cmi.student_preference.speed", "0"),
    ("cmi.student_preference.text", "0"),
    ("cmi.interactions._children", "id,objectives,time,type,correct_responses,weighting,student_response,result,latency"),
    ("cmi.interactions._count", "0"),
];

/// SCORM 2004 run-time defaults
pub const SCORM_2004_DEFAULTS: &[(&str, &str)] = &[
    ("cmi._version", "1.0"),
    ("cmi.comments_from_learner._children", "comment,location,timestamp"),
    ("cmi.comments_from_learner._count", "0"),
    ("cmi.comments_from_lms._children", "comment,location,timestamp"),
    ("cmi.comments_from_lms._count", "0"),
    ("cmi.completion_status", "unknown"),
    ("cmi.completion_threshold", ""),
    ("cmi.credit", "credit"),
    ("cmi.entry", "ab-initio"),
    ("cmi.exit", ""),
    ("cmi.interactions._children", "id,type,objectives,timestamp,correct_responses,weighting,learner_response,result,latency,description"),
    ("cmi.interactions._count", "0"),
    ("cmi.launch_data", ""),
    ("cmi.learner_id", ""),
    ("cmi.learner_name", ""),
    ("cmi.learner_preference._children", "audio_level,language,delivery_speed,audio_captioning"),
    ("cmi.learner_preference.audio_level", "1"),
    ("cmi.learner_preference.language", ""),
    ("cmi.learner_preference.delivery_speed", "1"),
    ("cmi.learner_preference.audio_captioning", "0"),
    ("cmi.location", ""),
    ("cmi.max_time_allowed", ""),
    ("cmi.mode", "normal"),
    ("cmi.objectives._children", "id,score,success_status,completion_status,progress_measure,description"),
    ("cmi.objectives._count", "0"),
    ("cmi.progress_measure", ""),
    ("cmi.scaled_passing_score", ""),
    ("cmi.score._children", "scaled,raw,min,max"),
    ("cmi.score.scaled", ""),
    ("cmi.score.raw", ""),
    ("cmi.score.min", ""),
    ("cmi.score.max", ""),
    ("cmi.session_time", ""),
    ("cmi.success_status", "unknown"),
    ("cmi.suspend_data", ""),
    ("cmi.time_limit_action", "continue,no message"),
    ("cmi.total_time", "PT0H0M0S"),
];

/// Default table for a protocol version
pub fn defaults_for(version: ProtocolVersion) -> &'static [(&'static str, &'static str)] {
    match version {
        ProtocolVersion::Scorm12 => SCORM_12_DEFAULTS,
        ProtocolVersion::Scorm2004 => SCORM_2004_DEFAULTS,
    }
}

/// Default value of `element` under `version`, empty when unlisted
pub fn default_value(version: ProtocolVersion, element: &str) -> &'static str {
    defaults_for(version)
        .iter()
        .find(|(name, _)| *name == element)
        .map(|(_, value)| *value)
        .unwrap_or("")
}
