//! Activity completion cache

mod ledger;

pub use ledger::ProgressLedger;
