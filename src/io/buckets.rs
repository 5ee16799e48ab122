use indexmap::IndexMap;
use log::warn;
use serde_json::{Map, Value};

use crate::io::store::{Store, StoreError, write_json};
use crate::model::day::is_day_key;
use crate::model::note::NoteRecord;

/// A day's notes keyed by id, in ascending id order.
pub type Bucket = IndexMap<u32, NoteRecord>;

/// What happened to one raw entry while loading a bucket
enum Entry {
    Kept(NoteRecord),
    Migrated(NoteRecord),
    Repaired(NoteRecord),
    Dropped,
}

/// Load a day bucket, repairing it in place.
///
/// Entries that are null or otherwise unstructured are dropped; legacy
/// single-text entries are migrated into `failingIssues`. Objects are always
/// kept, minus any field whose value has the wrong type. If anything was
/// repaired the bucket is rewritten.
pub fn read_bucket(store: &mut dyn Store, day: &str) -> Result<Bucket, StoreError> {
    let Some(raw) = store.get(day) else {
        return Ok(Bucket::new());
    };
    let map = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!("bucket {} is not a JSON object; resetting it", day);
            let empty = Bucket::new();
            write_bucket(store, day, &empty)?;
            return Ok(empty);
        }
    };

    let mut bucket = Bucket::new();
    let mut repaired = false;
    for (key, value) in map {
        let id = match key.parse::<u32>() {
            Ok(id) if id > 0 => id,
            _ => {
                warn!("dropping note with invalid id {:?} from {}", key, day);
                repaired = true;
                continue;
            }
        };
        match classify(value) {
            Entry::Kept(record) => {
                bucket.insert(id, record);
            }
            Entry::Migrated(record) => {
                warn!("migrated legacy note {} in {}", id, day);
                bucket.insert(id, record);
                repaired = true;
            }
            Entry::Repaired(record) => {
                warn!("reset mistyped fields of note {} in {}", id, day);
                bucket.insert(id, record);
                repaired = true;
            }
            Entry::Dropped => {
                warn!("dropping malformed note {} from {}", id, day);
                repaired = true;
            }
        }
    }
    bucket.sort_keys();

    if repaired {
        write_bucket(store, day, &bucket)?;
    }
    Ok(bucket)
}

fn classify(value: Value) -> Entry {
    match value {
        Value::String(text) => Entry::Migrated(legacy_record(text, &Map::new())),
        Value::Object(obj) => {
            if !obj.contains_key("failingIssues") {
                if let Some(Value::String(text)) = obj.get("text") {
                    return Entry::Migrated(legacy_record(text.clone(), &obj));
                }
            }
            match serde_json::from_value::<NoteRecord>(Value::Object(obj.clone())) {
                Ok(record) => Entry::Kept(record),
                Err(_) => Entry::Repaired(lenient_record(obj)),
            }
        }
        _ => Entry::Dropped,
    }
}

/// Build a record from the old single-text shape, keeping any lifecycle
/// fields the old entry carried.
fn legacy_record(text: String, obj: &Map<String, Value>) -> NoteRecord {
    let mut rest = obj.clone();
    rest.remove("text");
    let mut record = lenient_record(rest);
    record.failing_issues = text;
    record
}

/// Parse a note object field by field, leaving mistyped fields (null text,
/// a string where a flag belongs) at their defaults.
fn lenient_record(obj: Map<String, Value>) -> NoteRecord {
    let valid: Map<String, Value> = obj
        .into_iter()
        .filter(|(key, value)| {
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            serde_json::from_value::<NoteRecord>(Value::Object(single)).is_ok()
        })
        .collect();
    serde_json::from_value(Value::Object(valid)).unwrap_or_default()
}

/// Replace a whole bucket.
pub fn write_bucket(store: &mut dyn Store, day: &str, bucket: &Bucket) -> Result<(), StoreError> {
    let map: IndexMap<String, &NoteRecord> = bucket.iter().map(|(id, r)| (id.to_string(), r)).collect();
    write_json(store, day, &map)
}

/// Read-modify-write of one note's record.
pub fn write_record(store: &mut dyn Store, day: &str, id: u32, record: NoteRecord) -> Result<(), StoreError> {
    let mut bucket = read_bucket(store, day)?;
    bucket.insert(id, record);
    bucket.sort_keys();
    write_bucket(store, day, &bucket)
}

/// Remove one record, returning whether it existed. Does not renumber.
pub fn remove_record(store: &mut dyn Store, day: &str, id: u32) -> Result<bool, StoreError> {
    let mut bucket = read_bucket(store, day)?;
    let existed = bucket.shift_remove(&id).is_some();
    if existed {
        write_bucket(store, day, &bucket)?;
    }
    Ok(existed)
}

/// All day-bucket keys present in the store, in store order.
pub fn day_keys(store: &dyn Store) -> Vec<String> {
    store.keys().into_iter().filter(|k| is_day_key(k)).collect()
}
