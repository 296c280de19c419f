use serde::{Deserialize, Serialize};
use std::fmt;

/// Resume position of a record source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// Nothing consumed yet.
    #[default]
    None,

    /// Number of records already consumed from a file.
    Offset { offset: u64 },

    /// Next page to request from a paginated feed.
    Page { page: u64 },
}

impl Cursor {
    pub fn offset(&self) -> u64 {
        match self {
            Cursor::Offset { offset } => *offset,
            _ => 0,
        }
    }

    pub fn page(&self) -> u64 {
        match self {
            Cursor::Page { page } => *page,
            _ => 0,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::None => f.write_str("start"),
            Cursor::Offset { offset } => write!(f, "offset {offset}"),
            Cursor::Page { page } => write!(f, "page {page}"),
        }
    }
}
