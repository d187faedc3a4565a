//! Collection run models

use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a collection run. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackerState {
    Idle,
    Running,
    Draining,
    Finished,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Running => "running",
            TrackerState::Draining => "draining",
            TrackerState::Finished => "finished",
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u32,
    pub failed_ticks: u32,
    pub samples: usize,
    pub max_price: Option<f64>,
    pub stopped_early: bool,
    pub persisted: bool,
    pub chart_path: Option<PathBuf>,
    pub email_sent: bool,
}
