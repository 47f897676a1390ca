use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One extracted result: a mapping from field name to value.
///
/// No field is guaranteed present except whatever subset the identity
/// function requires; an absent field is simply missing from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut record = Self::new();
        for (name, value) in pairs {
            record.set(*name, *value);
        }
        record
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Derive a deduplication key by joining a subset of fields.
///
/// The first field is identity-bearing: if it is missing or blank the record
/// is noise and no key exists. Later fields contribute an empty segment when
/// absent. Keys are not globally unique; two distinct entities sharing the
/// identity fields collapse into one.
pub fn identity_key<S: AsRef<str>>(record: &Record, fields: &[S]) -> Option<String> {
    let lead_field = fields.first()?;
    let lead = record.get(lead_field.as_ref())?.trim();
    if lead.is_empty() {
        return None;
    }
    let mut parts = vec![lead];
    for field in &fields[1..] {
        parts.push(record.get(field.as_ref()).unwrap_or("").trim());
    }
    Some(parts.join("_"))
}

/// Small sidecar written next to the CSV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub partitions: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(total_records: usize, partitions: BTreeMap<String, usize>) -> Self {
        Self {
            total_records,
            partitions,
            generated_at: Utc::now(),
        }
    }
}
