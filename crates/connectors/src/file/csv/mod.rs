pub mod error;
pub mod source;

/// Column order of the person file.
pub const PERSON_COLUMNS: [&str; 4] = ["firstName", "lastName", "email", "age"];
