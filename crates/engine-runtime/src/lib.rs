pub mod error;
pub mod execution;

pub use execution::run;
