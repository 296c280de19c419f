use crate::records::person::PersonRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted version of a person.
///
/// Per email at most one row is current, and versions only ever grow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VersionedRow {
    pub id: i64,
    pub record: PersonRecord,
    pub version: i32,
    pub is_current: bool,
    pub updated_at: DateTime<Utc>,
}

impl VersionedRow {
    pub fn email(&self) -> &str {
        &self.record.email
    }

    pub fn matches(&self, record: &PersonRecord) -> bool {
        self.record.same_values(record)
    }
}
