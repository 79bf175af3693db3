//! Structured response recovery: untrusted model text → typed record.
//!
//! ```text
//! RECEIVED ──clean──▶ CLEANED ──parse──▶ PARSED
//!                        │                  ▲
//!                        └──repair──────────┘
//!                        │
//!                        └──(unparseable / wrong shape)──▶ DEGRADED
//! ```
//!
//! [`recover`] never fails. A reply that cannot be turned into the expected
//! shape becomes [`Recovered::Degraded`]: the shape's neutral value plus the
//! raw text, kept verbatim for manual review.

use super::clean::{Cleaned, Cleaner};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Note attached to every degraded record.
pub const DEGRADED_NOTE: &str =
    "Automatic analysis could not be completed. The original response is attached for manual review.";

/// A record shape that model output is recovered into.
pub trait ExpectedShape: DeserializeOwned {
    /// Top-level fields that must be present and non-null.
    fn required_fields() -> &'static [&'static str];

    /// Top-level list fields. Missing or null ones become `[]`.
    fn collection_fields() -> &'static [&'static str] {
        &[]
    }

    /// The neutral value used when recovery degrades: zero scores, subject
    /// `"unknown"`, empty collections.
    fn neutral() -> Self;
}

/// Why a reply degraded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradeReason {
    #[error("the response was empty")]
    Empty,

    #[error("the response is not valid JSON: {detail}")]
    Unparseable { detail: String },

    #[error("the response is JSON but not an object")]
    NotAnObject,

    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    #[error("the response does not match the expected shape: {detail}")]
    ShapeMismatch { detail: String },
}

/// Terminal recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    /// Parsed as-is after cleaning.
    Parsed,
    /// Parsed after a truncation repair.
    Repaired,
    /// Fell back to the neutral record.
    Degraded,
}

/// A recovered record: always a usable `T`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recovered<T> {
    Parsed {
        value: T,
        /// The repair applied before parsing, if any.
        repair: Option<&'static str>,
    },
    Degraded {
        value: T,
        reason: DegradeReason,
        note: &'static str,
        /// The model's reply, exactly as received.
        raw_text: String,
    },
}

impl<T> Recovered<T> {
    /// The record, parsed or neutral.
    pub fn value(&self) -> &T {
        match self {
            Recovered::Parsed { value, .. } | Recovered::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Recovered::Parsed { value, .. } | Recovered::Degraded { value, .. } => value,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Recovered::Parsed { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Recovered::Degraded { .. })
    }

    pub fn state(&self) -> RecoveryState {
        match self {
            Recovered::Parsed { repair: None, .. } => RecoveryState::Parsed,
            Recovered::Parsed { repair: Some(_), .. } => RecoveryState::Repaired,
            Recovered::Degraded { .. } => RecoveryState::Degraded,
        }
    }

    /// The raw reply, for degraded records.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Recovered::Degraded { raw_text, .. } => Some(raw_text),
            Recovered::Parsed { .. } => None,
        }
    }
}

/// Recover a `T` from raw model text with the default cleaner.
pub fn recover<T: ExpectedShape>(raw: &str) -> Recovered<T> {
    recover_with(raw, &Cleaner::default())
}

/// Recover a `T` using a custom cleaner.
pub fn recover_with<T: ExpectedShape>(raw: &str, cleaner: &Cleaner) -> Recovered<T> {
    debug!("Recovery: RECEIVED ({} chars)", raw.chars().count());
    let Cleaned {
        text,
        repair,
        truncated,
        ..
    } = cleaner.clean_with_report(raw);
    debug!("Recovery: CLEANED (truncated: {})", truncated);

    match parse_shape::<T>(&text) {
        Ok(value) => {
            match repair {
                Some(name) => info!("Recovery: TRUNCATION_REPAIRED via '{}' → PARSED", name),
                None => debug!("Recovery: PARSED"),
            }
            Recovered::Parsed { value, repair }
        }
        Err(reason) => {
            warn!("Recovery: DEGRADED ({})", reason);
            Recovered::Degraded {
                value: T::neutral(),
                reason,
                note: DEGRADED_NOTE,
                raw_text: raw.to_string(),
            }
        }
    }
}

fn parse_shape<T: ExpectedShape>(text: &str) -> Result<T, DegradeReason> {
    if text.trim().is_empty() {
        return Err(DegradeReason::Empty);
    }

    let value: Value = serde_json::from_str(text).map_err(|e| DegradeReason::Unparseable {
        detail: e.to_string(),
    })?;
    let Value::Object(mut members) = value else {
        return Err(DegradeReason::NotAnObject);
    };

    // Null members fall back to their defaults.
    members.retain(|_, v| !v.is_null());

    if let Some(field) = T::required_fields()
        .iter()
        .find(|f| !members.contains_key(**f))
    {
        return Err(DegradeReason::MissingField {
            field: (*field).to_string(),
        });
    }

    for field in T::collection_fields() {
        members
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(vec![]));
    }

    serde_json::from_value(Value::Object(members)).map_err(|e| DegradeReason::ShapeMismatch {
        detail: e.to_string(),
    })
}

/// Any JSON object; nothing required.
impl ExpectedShape for Map<String, Value> {
    fn required_fields() -> &'static [&'static str] {
        &[]
    }

    fn neutral() -> Self {
        Map::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct Grade {
        score: u32,
        #[serde(default)]
        comments: Vec<String>,
    }

    impl ExpectedShape for Grade {
        fn required_fields() -> &'static [&'static str] {
            &["score"]
        }
        fn collection_fields() -> &'static [&'static str] {
            &["comments"]
        }
        fn neutral() -> Self {
            Grade {
                score: 0,
                comments: vec![],
            }
        }
    }

    #[test]
    fn parses_clean_json() {
        let r: Recovered<Grade> = recover(r#"{"score": 7, "comments": ["ok"]}"#);
        assert_eq!(r.state(), RecoveryState::Parsed);
        assert_eq!(r.value().score, 7);
        assert_eq!(r.raw_text(), None);
    }

    #[test]
    fn null_collection_becomes_empty() {
        let r: Recovered<Grade> = recover(r#"{"score": 7, "comments": null}"#);
        assert!(r.is_parsed());
        assert!(r.value().comments.is_empty());
    }

    #[test]
    fn repaired_truncation_is_reported() {
        let r: Recovered<Grade> = recover(r#"{"score": 7, "comments": ["fine", "nea"#);
        assert_eq!(r.state(), RecoveryState::Repaired);
        assert_eq!(r.value().comments, vec!["fine", "nea"]);
    }

    #[test]
    fn missing_required_field_degrades() {
        let raw = r#"{"comments": []}"#;
        let r: Recovered<Grade> = recover(raw);
        match &r {
            Recovered::Degraded {
                value,
                reason,
                raw_text,
                note,
            } => {
                assert_eq!(value, &Grade::neutral());
                assert_eq!(
                    reason,
                    &DegradeReason::MissingField {
                        field: "score".into()
                    }
                );
                assert_eq!(raw_text, raw);
                assert_eq!(*note, DEGRADED_NOTE);
            }
            other => panic!("expected degraded, got {other:?}"),
        }
    }

    #[test]
    fn wrong_types_degrade() {
        let r: Recovered<Grade> = recover(r#"{"score": "seven"}"#);
        assert!(matches!(
            r,
            Recovered::Degraded {
                reason: DegradeReason::ShapeMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn non_object_degrades() {
        let r: Recovered<Grade> = recover("[1, 2, 3]");
        assert!(matches!(
            r,
            Recovered::Degraded {
                reason: DegradeReason::NotAnObject,
                ..
            }
        ));
    }

    #[test]
    fn empty_input_degrades() {
        for raw in ["", "   \n\t"] {
            let r: Recovered<Grade> = recover(raw);
            assert!(matches!(
                r,
                Recovered::Degraded {
                    reason: DegradeReason::Empty,
                    ..
                }
            ));
            assert_eq!(r.raw_text(), Some(raw));
        }
    }

    #[test]
    fn any_object_shape() {
        let r: Recovered<Map<String, Value>> = recover("```json\n{\"x\": 1}\n```");
        assert_eq!(r.value().get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn serializes_with_status_tag() {
        let r: Recovered<Grade> = recover("nope");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"]["kind"], "unparseable");
        assert_eq!(json["raw_text"], "nope");
    }
}
