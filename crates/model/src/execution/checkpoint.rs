use crate::pagination::cursor::Cursor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable resume marker of one step's source within a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub run_id: u64,
    pub step: String,
    pub cursor: Cursor,
    pub finished: bool,
    /// Items written by committed chunks up to this cursor.
    pub items_committed: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: u64, step: &str, cursor: Cursor, finished: bool) -> Self {
        Self {
            run_id,
            step: step.to_string(),
            cursor,
            finished,
            items_committed: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_items_committed(mut self, items: u64) -> Self {
        self.items_committed = items;
        self
    }
}
