pub mod chain;
pub mod matcher;
pub mod sanitize;
