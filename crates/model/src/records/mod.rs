pub mod person;
pub mod versioned;
