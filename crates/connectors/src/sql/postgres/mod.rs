pub mod store;
mod utils;
