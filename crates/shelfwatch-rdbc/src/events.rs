//! Typed records produced by the shelf monitoring pipeline

use chrono::NaiveDateTime;

use crate::record::{Batch, Record};

/// Table receiving shelf fill measurements
pub const FILL_EVENTS_TABLE: &str = "shelf_fill_events";

/// Table receiving store entrance snapshots
pub const ENTRANCES_TABLE: &str = "store_entrances";

/// One shelf fill measurement from a camera frame
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfFillEvent {
    /// Store the camera belongs to
    pub store_id: i64,
    /// Shelf fill percentage (0 is treated as "no measurement" on write)
    pub fill_pct: Option<f64>,
    /// Frame timestamp
    pub ts: NaiveDateTime,
    /// Annotated frame location
    pub image_url: Option<String>,
}

impl ShelfFillEvent {
    /// Columns written, in order
    pub const COLUMNS: [&'static str; 4] = ["store_id", "ts", "fill_pct", "image_url"];
    /// A store has one measurement per timestamp
    pub const CONFLICT_KEYS: [&'static str; 2] = ["store_id", "ts"];

    /// Create an event without an image reference
    pub fn new(store_id: i64, fill_pct: f64, ts: NaiveDateTime) -> Self {
        Self {
            store_id,
            fill_pct: Some(fill_pct),
            ts,
            image_url: None,
        }
    }

    /// Attach the annotated frame location
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Convert to a record
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("store_id", self.store_id)
            .with("ts", self.ts)
            .with("fill_pct", self.fill_pct)
            .with("image_url", self.image_url.clone())
    }

    /// Batch for `shelf_fill_events`
    pub fn batch<'a>(events: impl IntoIterator<Item = &'a ShelfFillEvent>) -> Batch {
        Batch::new(FILL_EVENTS_TABLE, Self::COLUMNS, Self::CONFLICT_KEYS)
            .with_records(events.into_iter().map(Self::to_record))
    }
}

/// Visitor-facing shelf state captured at a store entrance camera
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntrance {
    /// Store identifier
    pub id_store: i64,
    /// Number of empty shelf slots detected
    pub void: i32,
    /// Snapshot location
    pub url: Option<String>,
    /// Capture time (`None` is stored as NULL)
    pub create_at: Option<NaiveDateTime>,
}

impl StoreEntrance {
    /// Columns written, in order
    pub const COLUMNS: [&'static str; 4] = ["id_store", "void", "url", "create_at"];

    /// Create an entrance record
    pub fn new(id_store: i64, void: i32) -> Self {
        Self {
            id_store,
            void,
            url: None,
            create_at: None,
        }
    }

    /// Set the snapshot location
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the capture time
    pub fn with_create_at(mut self, at: NaiveDateTime) -> Self {
        self.create_at = Some(at);
        self
    }

    /// Convert to a record
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("id_store", self.id_store)
            .with("void", self.void)
            .with("url", self.url.clone())
            .with("create_at", self.create_at)
    }

    /// Batch for `store_entrances` (no conflict key: append only)
    pub fn batch<'a>(entrances: impl IntoIterator<Item = &'a StoreEntrance>) -> Batch {
        Batch::new(ENTRANCES_TABLE, Self::COLUMNS, Vec::<String>::new())
            .with_records(entrances.into_iter().map(Self::to_record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_fill_event_batch() {
        let events = [
            ShelfFillEvent::new(7, 42.5, ts()).with_image_url("s3://frames/7/0001.jpg"),
            ShelfFillEvent::new(8, 0.0, ts()),
        ];
        let batch = ShelfFillEvent::batch(&events);

        assert_eq!(batch.table(), FILL_EVENTS_TABLE);
        assert_eq!(batch.conflict_keys(), ["store_id", "ts"]);
        assert_eq!(batch.len(), 2);
        batch.validate().unwrap();

        let rows = batch.parameter_rows();
        assert_eq!(rows[0][0], Value::Int64(7));
        assert_eq!(rows[0][1], Value::DateTime(ts()));
        assert_eq!(rows[0][2], Value::Float64(42.5));
        assert_eq!(rows[1][3], Value::Null);
    }

    #[test]
    fn test_entrance_record() {
        let entrance = StoreEntrance::new(3, 12).with_url("s3://entrances/3.jpg");
        let record = entrance.to_record();
        assert_eq!(record.get("void"), Some(&Value::Int32(12)));
        assert_eq!(record.get("create_at"), Some(&Value::Null));

        let batch = StoreEntrance::batch([&entrance]);
        assert!(batch.conflict_keys().is_empty());
        batch.validate().unwrap();
    }
}
