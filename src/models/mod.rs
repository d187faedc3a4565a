//! Data models for the price tracker
//!
//! Plain data shared between the fetcher, the sample store, the collection
//! loop and the reporter.

pub mod config;
pub mod run;
pub mod sample;

pub use config::{EmailConfig, RunConfig};
pub use run::{RunSummary, TrackerState};
pub use sample::Sample;
