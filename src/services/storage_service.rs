use crate::models::Sample;
use crate::utils::errors::StorageError;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Append-only, in-memory price samples for the current run.
/// `record` is the only mutator; insertion order is chronological order.
#[derive(Debug, Default, Clone)]
pub struct SampleStore {
    samples: Vec<Sample>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Only non-finite prices are rejected.
    pub fn record(&mut self, timestamp: NaiveDateTime, price: f64) -> Result<(), StorageError> {
        if !price.is_finite() {
            return Err(StorageError::NonFinitePrice(price));
        }

        self.samples.push(Sample::new(timestamp, price));
        debug!("Stored price {:.2} at {}", price, timestamp);
        Ok(())
    }

    /// Every sample in insertion order
    pub fn all(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Highest recorded price, `None` when nothing was recorded
    pub fn max_price(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.price).reduce(f64::max)
    }

    /// Write every sample to `path` as a JSON array, replacing the file in one step.
    /// Failures are logged and returned; the in-memory samples are untouched.
    pub fn persist(&self, path: &Path) -> Result<(), StorageError> {
        match write_json_atomic(path, &self.samples) {
            Ok(()) => {
                info!("Saved {} samples to {}", self.samples.len(), path.display());
                Ok(())
            }
            Err(e) => {
                error!("Error saving samples to JSON file: {}", e);
                Err(e)
            }
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_json_atomic(path: &Path, samples: &[Sample]) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(samples)?;
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = temp_path_for(path);
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_micro_opt(9, minute, 0, 123_456)
            .unwrap()
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("price-tracker-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_empty_store_has_no_max() {
        let store = SampleStore::new();
        assert!(store.all().is_empty());
        assert_eq!(store.max_price(), None);
    }

    #[test]
    fn test_record_keeps_order_and_max() {
        let mut store = SampleStore::new();
        store.record(at(0), 105565.74).unwrap();
        store.record(at(1), 106010.0).unwrap();
        store.record(at(2), 105990.5).unwrap();

        let prices: Vec<f64> = store.all().iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![105565.74, 106010.0, 105990.5]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.max_price(), Some(106010.0));
    }

    #[test]
    fn test_record_rejects_non_finite() {
        let mut store = SampleStore::new();
        assert!(matches!(
            store.record(at(0), f64::NAN),
            Err(StorageError::NonFinitePrice(_))
        ));
        assert!(store.record(at(0), f64::INFINITY).is_err());
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_persist_round_trip() {
        let path = temp_file("prices.json");
        let mut store = SampleStore::new();
        store.record(at(0), 100.0).unwrap();
        store.record(at(1), 110.25).unwrap();

        store.persist(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let read_back: Vec<Sample> = serde_json::from_str(&text).unwrap();
        assert_eq!(read_back, store.all());
        assert!(text.contains("\"timestamp\": \"2026-10-17T09:00:00.123456\""));
        assert!(!temp_path_for(&path).exists());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_persist_overwrites_previous_file() {
        let path = temp_file("prices.json");
        let mut first = SampleStore::new();
        first.record(at(0), 1.0).unwrap();
        first.record(at(1), 2.0).unwrap();
        first.persist(&path).unwrap();

        let mut second = SampleStore::new();
        second.record(at(5), 3.0).unwrap();
        second.persist(&path).unwrap();

        let read_back: Vec<Sample> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read_back, second.all());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_persist_empty_store_writes_empty_array() {
        let path = temp_file("empty.json");
        SampleStore::new().persist(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_persist_failure_keeps_samples() {
        // A regular file can't be used as a parent directory
        let blocker = temp_file("blocker");
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, b"x").unwrap();

        let mut store = SampleStore::new();
        store.record(at(0), 42.0).unwrap();

        let result = store.persist(&blocker.join("prices.json"));
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(store.len(), 1);

        let _ = fs::remove_dir_all(blocker.parent().unwrap());
    }
}
