// Ingestion: turning platform exports into object records
//
// Exports come in several historical shapes. The classic API nests identity
// under `general`, the newer API uses camelCase at the top level, and some
// dumps carry epoch timestamps. `normalize` folds them into one record shape
// and keeps the original document as the record's raw attributes.

mod snapshot;

pub use snapshot::JsonSnapshot;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use miette::Result;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PartialRecordError;
use crate::graph::{ObjectKey, ObjectRecord, ObjectType};

/// Output of one ingestion run
#[derive(Debug, Default)]
pub struct Ingested {
    /// Records accepted for graph construction
    pub records: Vec<ObjectRecord>,

    /// Records that could not be normalized
    pub rejected: Vec<PartialRecordError>,
}

impl Ingested {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize one raw object, sorting it into accepted or rejected
    pub fn push(&mut self, object_type: ObjectType, raw: &Value) {
        match normalize(object_type, raw) {
            Ok(record) => self.records.push(record),
            Err(err) => {
                warn!("Rejected record: {}", err);
                self.rejected.push(err);
            }
        }
    }
}

/// A source of object records, such as a snapshot file
pub trait RecordSource {
    fn load(&self) -> Result<Ingested>;
}

const ID_PATHS: &[&[&str]] = &[&["id"], &["general", "id"]];
const NAME_PATHS: &[&[&str]] = &[&["name"], &["general", "name"], &["displayName"]];
const CREATED_PATHS: &[&[&str]] = &[
    &["created_at"],
    &["dateCreated"],
    &["general", "date_created"],
    &["date_created_epoch"],
    &["general", "date_created_epoch"],
];

/// Key used for records whose id could not be read
const UNKNOWN_ID: &str = "?";

/// Normalize a raw exported object into a record.
///
/// The id may be an integer or a non-empty string; the name must be a
/// string. A creation time that cannot be parsed is dropped rather than
/// rejecting the record.
pub fn normalize(
    object_type: ObjectType,
    raw: &Value,
) -> std::result::Result<ObjectRecord, PartialRecordError> {
    let reject = |id: &str, name: &str, field: &str, reason: &str| PartialRecordError {
        key: ObjectKey::new(object_type, id),
        name: name.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let Value::Object(map) = raw else {
        return Err(reject(UNKNOWN_ID, "", "", "expected an object"));
    };

    let name = first_of(map, NAME_PATHS).and_then(Value::as_str);

    let id = match first_of(map, ID_PATHS) {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(_) => {
            return Err(reject(
                UNKNOWN_ID,
                name.unwrap_or_default(),
                "id",
                "expected an integer or a non-empty string",
            ))
        }
        None => return Err(reject(UNKNOWN_ID, name.unwrap_or_default(), "id", "missing")),
    };

    let Some(name) = name else {
        let reason = if first_of(map, NAME_PATHS).is_some() {
            "expected a string"
        } else {
            "missing"
        };
        return Err(reject(&id, "", "name", reason));
    };

    let mut record = ObjectRecord::new(object_type, id, name);
    record.raw = map.clone();

    if let Some(value) = first_of(map, CREATED_PATHS) {
        match parse_timestamp(value) {
            Some(created_at) => record.created_at = Some(created_at),
            None => debug!("{}: unreadable creation time {}", record.key(), value),
        }
    }

    Ok(record)
}

/// First present, non-null value among several dotted lookups
fn first_of<'a>(map: &'a Map<String, Value>, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let (first, rest) = path.split_first()?;
        let mut value = map.get(*first)?;
        for segment in rest {
            value = value.as_object()?.get(*segment)?;
        }
        (!value.is_null()).then_some(value)
    })
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), a bare date, or epoch milliseconds
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_epoch_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
            }
            s.parse::<i64>().ok().and_then(from_epoch_millis)
        }
        _ => None,
    }
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    // The platform reports 0 for "never recorded"
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}
