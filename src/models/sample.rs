//! Price sample models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single spot price observation.
///
/// Timestamps are local wall-clock time without an offset, serialized as
/// ISO-8601 (`2026-10-17T09:30:00.123456`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        Self { timestamp, price }
    }
}
