pub mod checkpoint;
pub mod params;
pub mod result;
pub mod skip;
