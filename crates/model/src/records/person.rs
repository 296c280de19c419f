use serde::{Deserialize, Serialize};
use std::fmt;

/// A person as delivered by a source, before any sanitization.
///
/// Every field is optional: delimited files may carry empty cells and the
/// remote feed may omit properties.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawPerson {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}

/// A sanitized person keyed by `email`.
///
/// Produced only by the record transform; immutable afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub age: Option<i32>,
}

impl PersonRecord {
    pub fn new(
        first_name: Option<String>,
        last_name: Option<String>,
        email: impl Into<String>,
        age: Option<i32>,
    ) -> Self {
        Self {
            first_name,
            last_name,
            email: email.into(),
            age,
        }
    }

    /// Field-by-field comparison where two absent values are equal.
    ///
    /// A blank name counts as absent, so rows stored before names were
    /// normalized still match their sanitized counterpart.
    pub fn same_values(&self, other: &PersonRecord) -> bool {
        name(&self.first_name) == name(&other.first_name)
            && name(&self.last_name) == name(&other.last_name)
            && self.email == other.email
            && self.age == other.age
    }
}

fn name(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|n| !n.is_empty())
}

impl fmt::Display for PersonRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "firstName={}, lastName={}, email={}, age={}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
            self.email,
            self.age.map(|a| a.to_string()).unwrap_or_default()
        )
    }
}
