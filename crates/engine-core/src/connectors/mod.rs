pub mod file_reader;
pub mod listener;
pub mod paged_reader;
pub mod processor;
pub mod sink;
pub mod source;
