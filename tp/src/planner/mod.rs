//! Active itinerary document lifecycle

mod controller;

pub use controller::{ActivePlan, PlanController};
