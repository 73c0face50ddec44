//! Itinerary domain types
//!
//! An itinerary record is the server row; its `itinerary_data` column holds
//! the generation model's JSON document as raw text. `ItineraryPlan` is the
//! decoded form. Model output is unreliable, so decoding first runs the text
//! through `sanitize_model_json` and tolerates both the bare document and the
//! `{"itinerary": {...}}` wrapper the model sometimes emits.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::ItineraryId;

/// Errors from decoding a model-produced itinerary document
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("document is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("document does not match the itinerary shape: {0}")]
    Shape(String),
}

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```(?:json)?\s*").expect("pattern is valid"))
}

fn fence_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*```$").expect("pattern is valid"))
}

fn broken_key_spaced() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#",\s*"\s+"([a-zA-Z_]+)":"#).expect("pattern is valid"))
}

fn broken_key_tight() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"," "([a-zA-Z_]+)":"#).expect("pattern is valid"))
}

fn trailing_comma() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("pattern is valid"))
}

/// Scrub common generation-model JSON damage
///
/// Strips markdown code fences, repairs the `," "key":` quote corruption the
/// model produces inside coordinate objects, drops trailing commas, and
/// removes BOM/NUL characters. Never fails; unparseable text passes through
/// for the JSON decoder to reject.
pub fn sanitize_model_json(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    text = fence_open().replace(&text, "").into_owned();
    text = fence_close().replace(&text, "").into_owned();
    text = broken_key_spaced().replace_all(&text, r#", "$1":"#).into_owned();
    text = broken_key_tight().replace_all(&text, r#", "$1":"#).into_owned();
    text = trailing_comma().replace_all(&text, "$1").into_owned();
    text.trim_matches(['\u{feff}', '\0']).to_string()
}

/// Geographic point attached to an activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One scheduled activity within a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Start time as model text (usually "HH:MM", not validated)
    #[serde(default)]
    pub time: String,

    /// Short activity label
    #[serde(default)]
    pub activity: String,

    /// Where the activity takes place
    #[serde(default)]
    pub location: String,

    /// Free-text length (e.g. "2 hours")
    #[serde(default)]
    pub duration: String,

    /// Estimated cost in the plan's currency
    #[serde(default)]
    pub cost: f64,

    /// Longer description for display
    #[serde(default)]
    pub description: String,

    /// Map position, when the model supplied one
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

/// One day of an itinerary plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// Day number, 1-indexed
    pub day: u32,

    /// Calendar date as model text (usually "YYYY-MM-DD", not validated)
    #[serde(default)]
    pub date: String,

    /// Theme line for the day
    #[serde(default)]
    pub theme: String,

    /// Scheduled activities in display order
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// Decoded itinerary document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryPlan {
    #[serde(default)]
    pub destination: String,

    /// Free-text trip length (e.g. "5 days")
    #[serde(default)]
    pub duration: String,

    #[serde(default)]
    pub total_estimated_cost: Option<f64>,

    #[serde(default)]
    pub currency: Option<String>,

    /// Day-by-day schedule; progress indexes into this
    #[serde(default)]
    pub days: Vec<DayPlan>,
}

impl ItineraryPlan {
    /// Decode a model-produced document, tolerating the usual damage
    ///
    /// Accepts both the bare document and the `{"itinerary": {...}}` wrapper.
    pub fn from_model_output(raw: &str) -> Result<Self, PlanParseError> {
        debug!(len = raw.len(), "ItineraryPlan::from_model_output: called");
        let cleaned = sanitize_model_json(raw);
        let value: Value = serde_json::from_str(&cleaned)?;
        let document = match value {
            Value::Object(mut map) => match map.remove("itinerary") {
                Some(inner) => inner,
                None => Value::Object(map),
            },
            other => other,
        };
        serde_json::from_value(document).map_err(|e| PlanParseError::Shape(e.to_string()))
    }

    /// Total number of activities across all days
    pub fn total_activities(&self) -> u32 {
        self.days.iter().map(|d| d.activities.len() as u32).sum()
    }

    /// Look up a day by its 1-indexed number
    pub fn day(&self, day: u32) -> Option<&DayPlan> {
        self.days.iter().find(|d| d.day == day)
    }

    /// Look up an activity by day number and 0-indexed position
    pub fn activity(&self, day: u32, activity_index: u32) -> Option<&Activity> {
        self.day(day).and_then(|d| d.activities.get(activity_index as usize))
    }
}

/// One row of the itinerary listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItinerarySummary {
    pub id: ItineraryId,
    pub title: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Full itinerary row as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryRecord {
    pub id: ItineraryId,
    pub title: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,

    /// Raw model document; decode with [`ItineraryPlan::from_model_output`]
    pub itinerary_data: String,

    pub created_at: DateTime<Utc>,

    /// Whether the itinerary belongs to a travel group
    pub is_group: bool,

    /// Owning group when `is_group` is set
    pub group_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "destination": "Lisbon",
        "duration": "2 days",
        "total_estimated_cost": 450.0,
        "currency": "EUR",
        "days": [
            {
                "day": 1,
                "date": "2030-05-01",
                "theme": "Old town",
                "activities": [
                    {"time": "09:00", "activity": "Castle", "location": "Alfama",
                     "duration": "2 hours", "cost": 15.0, "description": "Morning walk",
                     "coordinates": {"lat": 38.71, "lng": -9.13}},
                    {"time": "14:00", "activity": "Tram 28", "location": "Baixa",
                     "duration": "1 hour", "cost": 3.0, "description": "Ride the loop"}
                ]
            },
            {
                "day": 2,
                "date": "2030-05-02",
                "theme": "Coast",
                "activities": [
                    {"time": "10:00", "activity": "Belem", "location": "Belem",
                     "duration": "3 hours", "cost": 12.0, "description": "Pastries"}
                ]
            }
        ]
    }"#;

    // === POSITIVE TESTS: sanitize ===

    #[test]
    fn test_sanitize_strips_code_fences() {
        let raw = "```json\n{\"destination\": \"Goa\"}\n```";
        assert_eq!(sanitize_model_json(raw), "{\"destination\": \"Goa\"}");
    }

    #[test]
    fn test_sanitize_strips_bare_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(sanitize_model_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_sanitize_repairs_broken_coordinate_keys() {
        let raw = r#"{"lat": 1.0," "lng": 2.0}"#;
        assert_eq!(sanitize_model_json(raw), r#"{"lat": 1.0, "lng": 2.0}"#);

        let raw = r#"{"lat": 1.0, " "lng": 2.0}"#;
        assert_eq!(sanitize_model_json(raw), r#"{"lat": 1.0, "lng": 2.0}"#);
    }

    #[test]
    fn test_sanitize_drops_trailing_commas() {
        let raw = r#"{"days": [1, 2,],}"#;
        assert_eq!(sanitize_model_json(raw), r#"{"days": [1, 2]}"#);
    }

    #[test]
    fn test_sanitize_strips_bom() {
        let raw = "\u{feff}{\"a\": 1}";
        assert_eq!(sanitize_model_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_sanitize_passes_clean_text_through() {
        let raw = r#"{"a": 1}"#;
        assert_eq!(sanitize_model_json(raw), raw);
    }

    // === POSITIVE TESTS: decode ===

    #[test]
    fn test_decode_bare_document() {
        let plan = ItineraryPlan::from_model_output(PLAN).unwrap();
        assert_eq!(plan.destination, "Lisbon");
        assert_eq!(plan.days.len(), 2);
        assert_eq!(plan.total_activities(), 3);
        assert_eq!(plan.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_decode_wrapped_document() {
        let wrapped = format!(r#"{{"message": "Here you go", "itinerary": {PLAN}}}"#);
        let plan = ItineraryPlan::from_model_output(&wrapped).unwrap();
        assert_eq!(plan.destination, "Lisbon");
        assert_eq!(plan.days.len(), 2);
    }

    #[test]
    fn test_decode_fenced_document() {
        let fenced = format!("```json\n{PLAN}\n```");
        let plan = ItineraryPlan::from_model_output(&fenced).unwrap();
        assert_eq!(plan.destination, "Lisbon");
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let sparse = r#"{"days": [{"day": 1, "activities": [{"activity": "Walk"}]}]}"#;
        let plan = ItineraryPlan::from_model_output(sparse).unwrap();
        assert_eq!(plan.destination, "");
        assert_eq!(plan.total_activities(), 1);
        let act = plan.activity(1, 0).unwrap();
        assert_eq!(act.activity, "Walk");
        assert_eq!(act.cost, 0.0);
        assert!(act.coordinates.is_none());
    }

    #[test]
    fn test_activity_lookup() {
        let plan = ItineraryPlan::from_model_output(PLAN).unwrap();
        assert_eq!(plan.activity(1, 1).unwrap().activity, "Tram 28");
        assert_eq!(plan.activity(2, 0).unwrap().activity, "Belem");
        assert!(plan.activity(1, 2).is_none());
        assert!(plan.activity(3, 0).is_none());
    }

    // === NEGATIVE TESTS ===

    #[test]
    fn test_decode_rejects_non_json() {
        let err = ItineraryPlan::from_model_output("Sure! Here is your trip:").unwrap_err();
        assert!(matches!(err, PlanParseError::Syntax(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let err = ItineraryPlan::from_model_output(r#"{"days": "not an array"}"#).unwrap_err();
        assert!(matches!(err, PlanParseError::Shape(_)));
    }
}
