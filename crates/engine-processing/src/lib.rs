pub mod error;
pub mod executor;
pub mod sink;
pub mod skip;
pub mod transform;
