pub mod discrepancy;
pub mod versioned;
