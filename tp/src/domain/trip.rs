//! Trip request and local validation
//!
//! Validation runs client-side before anything is sent, so an invalid
//! request never reaches the wire.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors caught by client-side validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Destination must not be empty")]
    EmptyDestination,

    #[error("End date {end} must be after start date {start}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("Start date {0} is in the past")]
    PastStart(NaiveDate),

    #[error("Budget must not be negative: {0}")]
    NegativeBudget(f64),

    #[error("Travelers must be at least 1")]
    NoTravelers,

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Revision instructions must not be empty")]
    EmptyRevision,

    #[error("Day {day} has no activity at index {index}")]
    NoSuchActivity { day: u32, index: u32 },
}

/// Parameters for generating a new itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    /// Where the trip goes
    pub destination: String,

    /// First day of the trip
    pub start_date: NaiveDate,

    /// Last day of the trip (must be strictly after the start)
    pub end_date: NaiveDate,

    /// Total budget, when the user set one
    pub budget: Option<f64>,

    /// Number of people travelling
    pub travelers: u32,

    /// Free-text wishes forwarded to the generation model
    pub preferences: Option<String>,
}

impl TripRequest {
    /// Create a request with the common defaults (one traveler, no budget)
    pub fn new(destination: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let destination = destination.into();
        debug!(%destination, %start_date, %end_date, "TripRequest::new: called");
        Self {
            destination,
            start_date,
            end_date,
            budget: None,
            travelers: 1,
            preferences: None,
        }
    }

    /// Validate against today's date
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_at(Utc::now().date_naive())
    }

    /// Validate against an explicit "today"
    pub fn validate_at(&self, today: NaiveDate) -> Result<(), ValidationError> {
        debug!(%self.destination, %today, "TripRequest::validate_at: called");
        if self.destination.trim().is_empty() {
            return Err(ValidationError::EmptyDestination);
        }
        if self.end_date <= self.start_date {
            return Err(ValidationError::DateOrder {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.start_date < today {
            return Err(ValidationError::PastStart(self.start_date));
        }
        if let Some(budget) = self.budget
            && budget < 0.0
        {
            return Err(ValidationError::NegativeBudget(budget));
        }
        if self.travelers == 0 {
            return Err(ValidationError::NoTravelers);
        }
        Ok(())
    }
}
