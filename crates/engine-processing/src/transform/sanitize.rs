use async_trait::async_trait;
use engine_core::{connectors::processor::ItemProcessor, error::ProcessError};
use model::records::person::{PersonRecord, RawPerson};
use std::ops::RangeInclusive;
use tracing::debug;

pub const AGE_RANGE: RangeInclusive<i32> = 0..=150;

/// Turns a raw person into a `PersonRecord`.
///
/// Records without a usable email are rejected (filtered, not skipped).
/// Names are trimmed and blank names become absent; the email is trimmed
/// and lowercased. An implausible age is a skippable error.
#[derive(Debug, Default, Clone)]
pub struct PersonSanitizer;

impl PersonSanitizer {
    pub fn new() -> Self {
        Self
    }

    fn clean_name(name: &Option<String>) -> Option<String> {
        name.as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl ItemProcessor<RawPerson, PersonRecord> for PersonSanitizer {
    async fn process(&self, item: &RawPerson) -> Result<Option<PersonRecord>, ProcessError> {
        let email = match item.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() && email.contains('@') => email.to_lowercase(),
            other => {
                debug!(email = ?other, "Rejected person without a valid email");
                return Ok(None);
            }
        };

        if let Some(age) = item.age {
            if !AGE_RANGE.contains(&age) {
                return Err(ProcessError::InvalidField {
                    field: "age",
                    reason: format!("{age} is outside {}..={}", AGE_RANGE.start(), AGE_RANGE.end()),
                });
            }
        }

        Ok(Some(PersonRecord::new(
            Self::clean_name(&item.first_name),
            Self::clean_name(&item.last_name),
            email,
            item.age,
        )))
    }

    fn name(&self) -> &str {
        "sanitizer"
    }
}
