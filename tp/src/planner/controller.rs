//! Active itinerary document lifecycle
//!
//! The controller holds at most one decoded itinerary document. Replacement
//! is atomic: a new document is decoded first and installed only on success,
//! so a failed install or revision always leaves the prior document intact.
//! Every successful replacement bumps a monotonic version; cached state
//! derived from an older version (progress, in particular) is stale by
//! definition.

use tracing::debug;

use crate::domain::{ItineraryId, ItineraryPlan, ItineraryRecord, PlanParseError};

/// The currently open itinerary with its decoded document
#[derive(Debug, Clone)]
pub struct ActivePlan {
    /// Server row, `itinerary_data` kept in sync with `plan`
    pub record: ItineraryRecord,

    /// Decoded document
    pub plan: ItineraryPlan,

    /// Version at which this document was installed
    pub version: u64,
}

/// Owns the active itinerary document
#[derive(Debug, Default)]
pub struct PlanController {
    active: Option<ActivePlan>,
    version: u64,
}

impl PlanController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active itinerary, if one is open
    pub fn active(&self) -> Option<&ActivePlan> {
        self.active.as_ref()
    }

    /// Id of the active itinerary
    pub fn active_id(&self) -> Option<ItineraryId> {
        self.active.as_ref().map(|a| a.record.id)
    }

    /// Decoded document of the active itinerary
    pub fn plan(&self) -> Option<&ItineraryPlan> {
        self.active.as_ref().map(|a| &a.plan)
    }

    /// Version of the most recent successful install (0 before the first)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Check whether a version still refers to the active document
    pub fn is_current(&self, version: u64) -> bool {
        self.active.as_ref().is_some_and(|a| a.version == version)
    }

    /// Open an itinerary, replacing whatever was active
    ///
    /// Decode failure leaves the previously active document in place.
    /// Returns the new version.
    pub fn install(&mut self, record: ItineraryRecord) -> Result<u64, PlanParseError> {
        debug!(id = record.id, "PlanController::install: called");
        let plan = ItineraryPlan::from_model_output(&record.itinerary_data)?;
        self.version += 1;
        self.active = Some(ActivePlan {
            record,
            plan,
            version: self.version,
        });
        Ok(self.version)
    }

    /// Replace the active document with a revised one
    ///
    /// Parse failure leaves the prior document and version untouched.
    /// Returns the new version.
    pub fn apply_update(&mut self, raw: &str) -> Result<u64, PlanParseError> {
        debug!(len = raw.len(), "PlanController::apply_update: called");
        let plan = ItineraryPlan::from_model_output(raw)?;
        let Some(active) = self.active.as_mut() else {
            return Err(PlanParseError::Shape("no active itinerary to update".to_string()));
        };
        active.record.itinerary_data = raw.to_string();
        active.plan = plan;
        self.version += 1;
        active.version = self.version;
        Ok(self.version)
    }

    /// Drop the active itinerary
    pub fn clear(&mut self) {
        debug!("PlanController::clear: called");
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: ItineraryId, raw: &str) -> ItineraryRecord {
        ItineraryRecord {
            id,
            title: format!("Trip {id}"),
            destination: "Lisbon".to_string(),
            start_date: "2030-05-01".parse().unwrap(),
            end_date: "2030-05-03".parse().unwrap(),
            budget: Some(500.0),
            itinerary_data: raw.to_string(),
            created_at: Utc::now(),
            is_group: false,
            group_id: None,
        }
    }

    const RAW: &str = r#"{"destination": "Lisbon", "days": [{"day": 1, "activities": [{"activity": "Castle"}]}]}"#;
    const RAW_V2: &str = r#"{"destination": "Lisbon", "days": [{"day": 1, "activities": [{"activity": "Museum"}, {"activity": "Tram"}]}]}"#;

    // === POSITIVE TESTS ===

    #[test]
    fn test_install_decodes_and_versions() {
        let mut controller = PlanController::new();
        assert_eq!(controller.version(), 0);
        assert!(controller.active().is_none());

        let version = controller.install(record(1, RAW)).unwrap();
        assert_eq!(version, 1);
        assert_eq!(controller.active_id(), Some(1));
        assert_eq!(controller.plan().unwrap().total_activities(), 1);
        assert!(controller.is_current(1));
    }

    #[test]
    fn test_install_replaces_prior_document() {
        let mut controller = PlanController::new();
        controller.install(record(1, RAW)).unwrap();
        let version = controller.install(record(2, RAW_V2)).unwrap();

        assert_eq!(version, 2);
        assert_eq!(controller.active_id(), Some(2));
        assert!(!controller.is_current(1));
        assert_eq!(controller.plan().unwrap().total_activities(), 2);
    }

    #[test]
    fn test_apply_update_bumps_version_and_swaps_document() {
        let mut controller = PlanController::new();
        controller.install(record(1, RAW)).unwrap();

        let version = controller.apply_update(RAW_V2).unwrap();
        assert_eq!(version, 2);
        assert_eq!(controller.active_id(), Some(1));
        assert_eq!(controller.plan().unwrap().total_activities(), 2);
        assert_eq!(controller.active().unwrap().record.itinerary_data, RAW_V2);
    }

    #[test]
    fn test_clear_drops_active() {
        let mut controller = PlanController::new();
        controller.install(record(1, RAW)).unwrap();
        controller.clear();
        assert!(controller.active().is_none());
        assert!(!controller.is_current(1));
    }

    // === NEGATIVE TESTS: failed replacements retain the prior document ===

    #[test]
    fn test_install_failure_keeps_prior() {
        let mut controller = PlanController::new();
        controller.install(record(1, RAW)).unwrap();

        let err = controller.install(record(2, "not json at all")).unwrap_err();
        assert!(matches!(err, PlanParseError::Syntax(_)));

        assert_eq!(controller.active_id(), Some(1));
        assert_eq!(controller.version(), 1);
        assert!(controller.is_current(1));
    }

    #[test]
    fn test_apply_update_failure_keeps_prior() {
        let mut controller = PlanController::new();
        controller.install(record(1, RAW)).unwrap();

        controller.apply_update(r#"{"days": 7}"#).unwrap_err();

        assert_eq!(controller.version(), 1);
        assert_eq!(controller.active().unwrap().record.itinerary_data, RAW);
        assert_eq!(controller.plan().unwrap().total_activities(), 1);
    }

    #[test]
    fn test_apply_update_without_active_errors() {
        let mut controller = PlanController::new();
        assert!(controller.apply_update(RAW).is_err());
        assert_eq!(controller.version(), 0);
    }
}
